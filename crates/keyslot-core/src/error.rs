//! Error types for keyslot-core
//!
//! None of these reach callers of [`crate::CredentialStore`]: store failures
//! are normalized to `false` / `None` and shared-credential failures are
//! dropped. Configuration errors are the exception and abort bootstrap.

use thiserror::Error;

/// Status reported by a [`crate::SecureStore`] for a failed call.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No item matched the query
    #[error("item not found")]
    ItemNotFound,

    /// An item with the same service and account already exists
    #[error("duplicate item")]
    DuplicateItem,

    /// The attribute set cannot be executed by this store
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The store is not available on this platform or build
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The store itself failed (I/O, IPC, tool exit status)
    #[error("backend error: {0}")]
    Backend(String),

    /// At-rest encryption failed
    #[error("encryption error: {0}")]
    Encryption(String),
}

impl StoreError {
    /// Whether this status is part of normal single-slot operation.
    ///
    /// `ItemNotFound` after deleting an empty slot and `DuplicateItem` after a
    /// lost race are expected; everything else is worth a warning.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::ItemNotFound | Self::DuplicateItem)
    }
}

impl From<keyslot_crypto::CryptoError> for StoreError {
    fn from(e: keyslot_crypto::CryptoError) -> Self {
        Self::Encryption(e.to_string())
    }
}

/// Result type for secure store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of a shared web-credential upsert.
///
/// Produced by [`crate::SharedCredentialService`] implementations and never
/// observed by the credential store that triggered the upsert.
#[derive(Debug, Error)]
pub enum SharedCredentialError {
    /// The platform has no shared web-credential facility
    #[error("shared web credentials are not supported on this platform")]
    Unsupported,

    /// The facility refused the request (domain mismatch, throttling, user denial)
    #[error("shared credential rejected: {0}")]
    Rejected(String),
}

/// Configuration errors. These are fatal: no store is built without a namespace.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The service namespace is unset or blank
    #[error("credential namespace is not configured (set store.service or KEYSLOT_STORE__SERVICE)")]
    MissingNamespace,

    /// The service namespace has leading or trailing whitespace
    #[error("credential namespace {0:?} has surrounding whitespace")]
    PaddedNamespace(String),

    /// Loading or deserializing configuration failed
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The requested backend cannot be used in this build or platform
    #[error("credential backend unavailable: {0}")]
    UnavailableBackend(String),

    /// No per-user data directory could be determined
    #[error("cannot determine data directory")]
    DataDir,
}
