//! Linux Secret Service / Windows Credential Manager backend
//!
//! The `keyring` crate addresses entries by (service, user) and cannot
//! search by service alone, so each namespace maps to one entry with the
//! fixed user [`SLOT_USER`]. The entry's secret is a JSON [`StoredItem`]
//! carrying the real account name next to the payload.

use super::{ensure_match_keys, require_text, StoredItem};
use crate::attributes::{AttributeKey, AttributeSet};
use crate::error::{StoreError, StoreResult};
use crate::secure_store::SecureStore;
use keyring::{Entry, Error as KeyringError};
use tracing::{debug, warn};

/// Keyring user under which a namespace's single item lives
pub const SLOT_USER: &str = "credential";

/// OS keyring store
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

impl KeyringStore {
    /// Create a handle to the platform keyring
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn entry(service: &str) -> StoreResult<Entry> {
        Entry::new(service, SLOT_USER).map_err(map_keyring_error)
    }

    fn load(entry: &Entry) -> StoreResult<StoredItem> {
        let bytes = entry.get_secret().map_err(map_keyring_error)?;
        StoredItem::from_json(&bytes)
    }
}

fn map_keyring_error(err: KeyringError) -> StoreError {
    match err {
        KeyringError::NoEntry => StoreError::ItemNotFound,
        KeyringError::NoStorageAccess(e) | KeyringError::PlatformFailure(e) => {
            StoreError::Backend(format!("Keyring error: {}", e))
        }
        other => StoreError::Backend(format!("Keyring error: {}", other)),
    }
}

impl SecureStore for KeyringStore {
    fn insert(&self, attributes: &AttributeSet) -> StoreResult<()> {
        let item = StoredItem::from_attributes(attributes)?;
        let entry = Self::entry(&item.service)?;

        match Self::load(&entry) {
            Ok(_) => return Err(StoreError::DuplicateItem),
            Err(StoreError::ItemNotFound) => {}
            Err(e) => {
                // An unreadable payload still occupies the slot.
                warn!(service = %item.service, error = %e, "Existing keyring entry unreadable");
                return Err(StoreError::DuplicateItem);
            }
        }

        let json = item.to_json()?;
        entry.set_secret(&json).map_err(map_keyring_error)?;
        debug!(service = %item.service, "Keyring entry written");
        Ok(())
    }

    fn delete_matching(&self, query: &AttributeSet) -> StoreResult<()> {
        ensure_match_keys(query)?;
        let service = require_text(query, AttributeKey::Service)?;
        let entry = Self::entry(service)?;

        if query.contains(AttributeKey::Account) {
            let item = Self::load(&entry)?;
            if !query.selects(&item.to_attributes()) {
                return Err(StoreError::ItemNotFound);
            }
        }

        entry.delete_credential().map_err(map_keyring_error)
    }

    fn find_one(&self, query: &AttributeSet) -> StoreResult<AttributeSet> {
        ensure_match_keys(query)?;
        let service = require_text(query, AttributeKey::Service)?;
        let item = Self::load(&Self::entry(service)?)?.to_attributes();

        if !query.selects(&item) {
            return Err(StoreError::ItemNotFound);
        }
        Ok(query.project(&item))
    }

    fn name(&self) -> &'static str {
        "keyring"
    }
}
