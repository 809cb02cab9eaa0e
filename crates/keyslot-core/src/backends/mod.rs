//! Secure store implementations and backend selection

mod encrypted_file;
mod keychain;
mod memory;
#[cfg(feature = "native-keyring")]
mod native_keyring;

pub use encrypted_file::{EncryptedFileStore, ENV_MASTER_KEY};
pub use keychain::KeychainStore;
pub use memory::MemoryStore;
#[cfg(feature = "native-keyring")]
pub use native_keyring::{KeyringStore, SLOT_USER};

use crate::attributes::{
    Accessibility, AttributeKey, AttributeSet, AttributeValue, ItemClass,
};
use crate::config::StoreConfig;
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::secure_store::SecureStore;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroize;

/// Supported secure store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackend {
    /// Automatic selection based on platform
    #[default]
    Auto,
    /// macOS Keychain
    Keychain,
    /// Linux Secret Service / Windows Credential Manager
    Keyring,
    /// Encrypted file fallback
    EncryptedFile,
    /// In-memory only (for testing)
    Memory,
}

impl CredentialBackend {
    /// Detect the best backend for the current platform
    #[must_use]
    pub fn detect() -> Self {
        #[cfg(target_os = "macos")]
        {
            Self::Keychain
        }
        #[cfg(all(
            not(target_os = "macos"),
            feature = "native-keyring",
            any(target_os = "linux", target_os = "windows")
        ))]
        {
            Self::Keyring
        }
        #[cfg(not(any(
            target_os = "macos",
            all(
                feature = "native-keyring",
                any(target_os = "linux", target_os = "windows")
            )
        )))]
        {
            Self::EncryptedFile
        }
    }

    /// Resolve Auto to actual backend
    #[must_use]
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto => Self::detect(),
            other => other,
        }
    }
}

/// Build the secure store selected by `config`.
pub fn open_backend(config: &StoreConfig) -> Result<Arc<dyn SecureStore>, ConfigError> {
    let backend = config.backend.resolve();
    info!(backend = ?backend, "Opening secure store");

    match backend {
        CredentialBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        CredentialBackend::Keychain => {
            if cfg!(target_os = "macos") {
                Ok(Arc::new(KeychainStore::new()))
            } else {
                Err(ConfigError::UnavailableBackend(
                    "keychain backend requires macOS".to_string(),
                ))
            }
        }
        CredentialBackend::Keyring => open_keyring(),
        CredentialBackend::EncryptedFile => {
            let path = match config.encrypted_file_path() {
                Some(path) => path.to_path_buf(),
                None => EncryptedFileStore::default_path()?,
            };
            let mut master = EncryptedFileStore::master_secret();
            let store = EncryptedFileStore::open(path, master.as_bytes());
            master.zeroize();
            store
                .map(|s| Arc::new(s) as Arc<dyn SecureStore>)
                .map_err(|e| ConfigError::UnavailableBackend(e.to_string()))
        }
        CredentialBackend::Auto => Err(ConfigError::UnavailableBackend(
            "backend not resolved".to_string(),
        )),
    }
}

#[cfg(feature = "native-keyring")]
fn open_keyring() -> Result<Arc<dyn SecureStore>, ConfigError> {
    Ok(Arc::new(KeyringStore::new()))
}

#[cfg(not(feature = "native-keyring"))]
fn open_keyring() -> Result<Arc<dyn SecureStore>, ConfigError> {
    Err(ConfigError::UnavailableBackend(
        "keyring backend requires the native-keyring feature".to_string(),
    ))
}

/// Handle lock poison errors consistently
pub(crate) fn handle_lock_poison<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Backend(format!("Lock poisoned: {}", e))
}

/// Refuse queries that would select every item
pub(crate) fn ensure_match_keys(query: &AttributeSet) -> StoreResult<()> {
    if query.has_match_keys() {
        Ok(())
    } else {
        Err(StoreError::InvalidQuery(
            "query has no match attributes".to_string(),
        ))
    }
}

/// Required text attribute
pub(crate) fn require_text(attributes: &AttributeSet, key: AttributeKey) -> StoreResult<&str> {
    attributes
        .text(key)
        .ok_or_else(|| StoreError::InvalidQuery(format!("missing {:?} attribute", key)))
}

/// Items collide when service and account are equal
pub(crate) fn is_same_item(a: &AttributeSet, b: &AttributeSet) -> bool {
    a.text(AttributeKey::Service) == b.text(AttributeKey::Service)
        && a.text(AttributeKey::Account).unwrap_or_default()
            == b.text(AttributeKey::Account).unwrap_or_default()
}

/// Serialized form of one item for stores that persist opaque blobs
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct StoredItem {
    pub service: String,
    #[serde(default)]
    pub account: String,
    /// Base64 payload
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub accessible: Accessibility,
}

impl StoredItem {
    pub fn from_attributes(attributes: &AttributeSet) -> StoreResult<Self> {
        let service = require_text(attributes, AttributeKey::Service)?.to_string();
        let accessible = match attributes.get(AttributeKey::Accessible) {
            Some(AttributeValue::Accessible(a)) => *a,
            _ => Accessibility::default(),
        };
        Ok(Self {
            service,
            account: attributes
                .text(AttributeKey::Account)
                .unwrap_or_default()
                .to_string(),
            data: attributes
                .data(AttributeKey::ValueData)
                .map(|d| BASE64.encode(d))
                .unwrap_or_default(),
            accessible,
        })
    }

    /// Rebuild the attribute view. Undecodable payloads come back as no data.
    pub fn to_attributes(&self) -> AttributeSet {
        let mut set = AttributeSet::new()
            .with(AttributeKey::Service, AttributeValue::text(&self.service))
            .with(AttributeKey::Account, AttributeValue::text(&self.account))
            .with(
                AttributeKey::Class,
                AttributeValue::Class(ItemClass::GenericPassword),
            )
            .with(
                AttributeKey::Accessible,
                AttributeValue::Accessible(self.accessible),
            );
        if let Ok(mut bytes) = BASE64.decode(&self.data) {
            set.insert(AttributeKey::ValueData, AttributeValue::data(&bytes));
            bytes.zeroize();
        }
        set
    }

    #[cfg_attr(not(feature = "native-keyring"), allow(dead_code))]
    pub fn to_json(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| StoreError::Backend(format!("Failed to serialize item: {}", e)))
    }

    #[cfg_attr(not(feature = "native-keyring"), allow(dead_code))]
    pub fn from_json(bytes: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Backend(format!("Failed to parse item: {}", e)))
    }
}

impl Drop for StoredItem {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}
