//! Platform secure-store boundary

use crate::attributes::AttributeSet;
use crate::error::StoreResult;

/// Capability interface to a platform secure credential service.
///
/// Implementations do not enforce the single-slot rule; that is the
/// credential store's job. They must:
/// - fail `insert` with [`crate::StoreError::DuplicateItem`] when an item
///   with the same service and account already exists;
/// - fail `delete_matching` and `find_one` with
///   [`crate::StoreError::ItemNotFound`] when nothing matches;
/// - refuse queries without any match key rather than act on every item.
#[cfg_attr(test, mockall::automock)]
pub trait SecureStore: Send + Sync {
    /// Store a new item described by `attributes`
    fn insert(&self, attributes: &AttributeSet) -> StoreResult<()>;

    /// Remove every item selected by `query`
    fn delete_matching(&self, query: &AttributeSet) -> StoreResult<()>;

    /// Return the first item selected by `query`, shaped by its return flags
    fn find_one(&self, query: &AttributeSet) -> StoreResult<AttributeSet>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}
