//! Query construction

use crate::attributes::{AttributeKey, AttributeSet, AttributeValue, ItemClass, MatchLimit};
use crate::namespace::Namespace;

/// What a query is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Single-item lookup returning attributes and payload
    Fetch,
    /// Namespace-wide selector for deletes and existence checks
    Update,
}

/// Build the attribute set for `kind` under `namespace`.
///
/// Pure: the result depends only on the two arguments.
///
/// `Fetch` adds `MatchLimit::One` and both return flags. `Update` carries
/// only the service and class, so it selects every item in the namespace.
#[must_use]
pub fn build_query(namespace: &Namespace, kind: QueryKind) -> AttributeSet {
    let base = AttributeSet::new()
        .with(
            AttributeKey::Service,
            AttributeValue::text(namespace.as_str()),
        )
        .with(
            AttributeKey::Class,
            AttributeValue::Class(ItemClass::GenericPassword),
        );

    match kind {
        QueryKind::Fetch => base
            .with(AttributeKey::MatchLimit, AttributeValue::Limit(MatchLimit::One))
            .with(AttributeKey::ReturnAttributes, AttributeValue::Flag(true))
            .with(AttributeKey::ReturnData, AttributeValue::Flag(true)),
        QueryKind::Update => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> Namespace {
        Namespace::new("com.example.app").unwrap()
    }

    #[test]
    fn test_fetch_query() {
        let q = build_query(&ns(), QueryKind::Fetch);

        assert_eq!(q.text(AttributeKey::Service), Some("com.example.app"));
        assert_eq!(
            q.get(AttributeKey::Class),
            Some(&AttributeValue::Class(ItemClass::GenericPassword))
        );
        assert_eq!(q.match_limit(), Some(MatchLimit::One));
        assert!(q.flag(AttributeKey::ReturnAttributes));
        assert!(q.flag(AttributeKey::ReturnData));
        assert_eq!(q.len(), 5);
    }

    #[test]
    fn test_update_query() {
        let q = build_query(&ns(), QueryKind::Update);

        assert_eq!(q.text(AttributeKey::Service), Some("com.example.app"));
        assert!(!q.contains(AttributeKey::MatchLimit));
        assert!(!q.contains(AttributeKey::ReturnAttributes));
        assert!(!q.contains(AttributeKey::ReturnData));
        assert!(!q.contains(AttributeKey::Account));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_query_is_pure() {
        for kind in [QueryKind::Fetch, QueryKind::Update] {
            assert_eq!(build_query(&ns(), kind), build_query(&ns(), kind));
        }
        let other = Namespace::new("com.example.other").unwrap();
        assert_ne!(
            build_query(&ns(), QueryKind::Update),
            build_query(&other, QueryKind::Update)
        );
    }
}
