//! Attribute model shared by queries and stored items
//!
//! A secure store is addressed with attribute sets: the same type describes
//! a new item (`insert`), a filter (`delete_matching` / `find_one`) and a
//! result (`find_one`'s return value). Control keys such as
//! [`AttributeKey::MatchLimit`] only make sense in queries and are never
//! stored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

/// Attribute keys understood by every [`crate::SecureStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeKey {
    /// Service namespace that owns the item
    Service,
    /// Account (username) of the item
    Account,
    /// Secret payload bytes
    ValueData,
    /// When the item may be read
    Accessible,
    /// Item class
    Class,
    /// How many items a lookup may return
    MatchLimit,
    /// Ask the store to return item attributes
    ReturnAttributes,
    /// Ask the store to return the secret payload
    ReturnData,
}

impl AttributeKey {
    /// Keys that filter items when present in a query
    #[must_use]
    pub fn is_match_key(self) -> bool {
        matches!(
            self,
            Self::Service | Self::Account | Self::Class | Self::Accessible
        )
    }

    /// Keys that steer a query but are never part of an item
    #[must_use]
    pub fn is_control_key(self) -> bool {
        matches!(
            self,
            Self::MatchLimit | Self::ReturnAttributes | Self::ReturnData
        )
    }
}

/// Item class of a stored secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemClass {
    /// Opaque password/token not tied to a protocol or host
    GenericPassword,
}

/// Cardinality of a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLimit {
    /// Return at most one item
    One,
    /// Return every match
    All,
}

/// When a stored item may be read.
///
/// `AfterFirstUnlock` is what the credential store writes by default: it
/// stays readable by background work once the device has been unlocked once
/// since boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    /// Readable after the first unlock since boot
    #[default]
    AfterFirstUnlock,
    /// Same as `AfterFirstUnlock`, never migrated to another device
    AfterFirstUnlockThisDeviceOnly,
    /// Readable only while unlocked
    WhenUnlocked,
    /// Same as `WhenUnlocked`, never migrated to another device
    WhenUnlockedThisDeviceOnly,
}

impl Accessibility {
    /// Stable identifier, used in persisted payloads
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AfterFirstUnlock => "after_first_unlock",
            Self::AfterFirstUnlockThisDeviceOnly => "after_first_unlock_this_device_only",
            Self::WhenUnlocked => "when_unlocked",
            Self::WhenUnlockedThisDeviceOnly => "when_unlocked_this_device_only",
        }
    }
}

/// Value of a single attribute
#[derive(Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// UTF-8 text (service, account)
    Text(String),
    /// Secret bytes, wiped on drop
    Data(Zeroizing<Vec<u8>>),
    /// Boolean flag
    Flag(bool),
    /// Item class
    Class(ItemClass),
    /// Lookup cardinality
    Limit(MatchLimit),
    /// Accessibility policy
    Accessible(Accessibility),
}

impl AttributeValue {
    /// Text value from anything string-like
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Data value copied from a byte slice
    pub fn data(bytes: &[u8]) -> Self {
        Self::Data(Zeroizing::new(bytes.to_vec()))
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Data(d) => write!(f, "Data([REDACTED, {} bytes])", d.len()),
            Self::Flag(b) => f.debug_tuple("Flag").field(b).finish(),
            Self::Class(c) => f.debug_tuple("Class").field(c).finish(),
            Self::Limit(l) => f.debug_tuple("Limit").field(l).finish(),
            Self::Accessible(a) => f.debug_tuple("Accessible").field(a).finish(),
        }
    }
}

/// An ordered set of attributes.
///
/// The default value is empty. An empty set used as a query matches every
/// item in the store, so a query builder that falls through to it turns a
/// targeted delete into a store-wide one; stores reject it instead of
/// executing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    entries: BTreeMap<AttributeKey, AttributeValue>,
}

impl AttributeSet {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: AttributeKey, value: AttributeValue) -> Self {
        self.entries.insert(key, value);
        self
    }

    /// Insert or replace an attribute
    pub fn insert(&mut self, key: AttributeKey, value: AttributeValue) {
        self.entries.insert(key, value);
    }

    /// Look up an attribute
    #[must_use]
    pub fn get(&self, key: AttributeKey) -> Option<&AttributeValue> {
        self.entries.get(&key)
    }

    /// Whether the key is present
    #[must_use]
    pub fn contains(&self, key: AttributeKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Text value of a key, if present and textual
    #[must_use]
    pub fn text(&self, key: AttributeKey) -> Option<&str> {
        match self.entries.get(&key) {
            Some(AttributeValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Data value of a key, if present and binary
    #[must_use]
    pub fn data(&self, key: AttributeKey) -> Option<&[u8]> {
        match self.entries.get(&key) {
            Some(AttributeValue::Data(d)) => Some(d.as_slice()),
            _ => None,
        }
    }

    /// Flag value of a key; absent or non-flag values read as `false`
    #[must_use]
    pub fn flag(&self, key: AttributeKey) -> bool {
        matches!(self.entries.get(&key), Some(AttributeValue::Flag(true)))
    }

    /// Match limit requested by a query, if any
    #[must_use]
    pub fn match_limit(&self) -> Option<MatchLimit> {
        match self.entries.get(&AttributeKey::MatchLimit) {
            Some(AttributeValue::Limit(limit)) => Some(*limit),
            _ => None,
        }
    }

    /// Number of attributes
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (&AttributeKey, &AttributeValue)> {
        self.entries.iter()
    }

    /// Whether this set, used as a query, selects `item`.
    ///
    /// Every match key in the query must be present in the item with an
    /// equal value. Control keys and payload data are ignored.
    #[must_use]
    pub fn selects(&self, item: &AttributeSet) -> bool {
        self.entries
            .iter()
            .filter(|(key, _)| key.is_match_key())
            .all(|(key, value)| item.get(*key) == Some(value))
    }

    /// Whether the query carries at least one match key
    #[must_use]
    pub fn has_match_keys(&self) -> bool {
        self.entries.keys().any(|key| key.is_match_key())
    }

    /// Shape a stored item into a lookup result according to the query's
    /// return flags.
    #[must_use]
    pub fn project(&self, item: &AttributeSet) -> AttributeSet {
        let want_attributes = self.flag(AttributeKey::ReturnAttributes);
        let want_data = self.flag(AttributeKey::ReturnData);

        let entries = item
            .entries
            .iter()
            .filter(|(key, _)| match key {
                AttributeKey::ValueData => want_data,
                k if k.is_control_key() => false,
                _ => want_attributes,
            })
            .map(|(k, v)| (*k, v.clone()))
            .collect();

        AttributeSet { entries }
    }

    /// Drop control keys, leaving what a store persists for an item
    #[must_use]
    pub fn without_control_keys(&self) -> AttributeSet {
        let entries = self
            .entries
            .iter()
            .filter(|(key, _)| !key.is_control_key())
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        AttributeSet { entries }
    }
}
