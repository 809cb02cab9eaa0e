//! In-memory secure store (tests and ephemeral processes)

use super::{ensure_match_keys, handle_lock_poison, is_same_item};
use crate::attributes::AttributeSet;
use crate::error::{StoreError, StoreResult};
use crate::secure_store::SecureStore;
use std::sync::RwLock;

/// Process-local store with the same matching rules as the platform stores.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<Vec<AttributeSet>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items currently held
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    /// Whether the store holds no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Put an item in place without the duplicate check.
    ///
    /// Simulates writes from another process sharing the namespace.
    pub fn seed(&self, attributes: AttributeSet) -> StoreResult<()> {
        let mut items = self.items.write().map_err(handle_lock_poison)?;
        items.push(attributes.without_control_keys());
        Ok(())
    }
}

impl SecureStore for MemoryStore {
    fn insert(&self, attributes: &AttributeSet) -> StoreResult<()> {
        let mut items = self.items.write().map_err(handle_lock_poison)?;
        if items.iter().any(|existing| is_same_item(existing, attributes)) {
            return Err(StoreError::DuplicateItem);
        }
        items.push(attributes.without_control_keys());
        Ok(())
    }

    fn delete_matching(&self, query: &AttributeSet) -> StoreResult<()> {
        ensure_match_keys(query)?;
        let mut items = self.items.write().map_err(handle_lock_poison)?;
        let before = items.len();
        items.retain(|item| !query.selects(item));
        if items.len() == before {
            return Err(StoreError::ItemNotFound);
        }
        Ok(())
    }

    fn find_one(&self, query: &AttributeSet) -> StoreResult<AttributeSet> {
        ensure_match_keys(query)?;
        let items = self.items.read().map_err(handle_lock_poison)?;
        items
            .iter()
            .find(|item| query.selects(item))
            .map(|item| query.project(item))
            .ok_or(StoreError::ItemNotFound)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
