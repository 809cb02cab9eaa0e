//! Keyslot Core - single-slot credential storage
//!
//! Stores one username/secret pair per namespace in a platform secure store
//! and optionally mirrors it to a shared web-credential facility:
//! - Query: builds the attribute sets that address the slot
//! - Store: the [`CredentialStore`] facade with replace-on-add semantics
//! - Backends: macOS Keychain, OS keyring, encrypted file, in-memory
//! - Shared: fire-and-forget shared web-credential updates
//! - Config: layered configuration and backend selection
//!
//! ## Security Features
//!
//! - **SecureString**: secrets are zeroized on drop and redacted in Debug output
//! - **Attribute payloads**: secret bytes in queries are zeroized and never printed
//! - **Encrypted file**: AES-256-GCM with owner-only file permissions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attributes;
pub mod backends;
pub mod config;
pub mod credential;
pub mod error;
pub mod namespace;
pub mod query;
pub mod secure_store;
pub mod secure_string;
pub mod shared;
pub mod store;

pub use attributes::{
    Accessibility, AttributeKey, AttributeSet, AttributeValue, ItemClass, MatchLimit,
};
pub use backends::{open_backend, CredentialBackend, EncryptedFileStore, KeychainStore, MemoryStore};
#[cfg(feature = "native-keyring")]
pub use backends::KeyringStore;
pub use crate::config::{build_config, load_config, KeyslotConfig, SharedConfig, StoreConfig};
pub use credential::{Credential, CredentialPart};
pub use error::{ConfigError, SharedCredentialError, StoreError, StoreResult};
pub use namespace::Namespace;
pub use query::{build_query, QueryKind};
pub use secure_store::SecureStore;
pub use secure_string::SecureString;
pub use shared::{MemorySharedCredentials, SharedCredentialService, UnsupportedSharedCredentials};
pub use store::CredentialStore;
