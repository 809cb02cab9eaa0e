//! Service namespace

use crate::error::ConfigError;
use std::fmt;

/// The service string that owns the single credential slot.
///
/// Usually the application's bundle or package identifier
/// (`com.example.app`). Resolved once during bootstrap and handed to
/// [`crate::CredentialStore::new`]; a blank value never becomes a namespace.
/// The string is kept verbatim, so a padded value is rejected rather than
/// silently addressing a different item than the raw identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Validate and wrap a service string
    pub fn new(service: impl Into<String>) -> Result<Self, ConfigError> {
        let service = service.into();
        if service.trim().is_empty() {
            return Err(ConfigError::MissingNamespace);
        }
        if service.trim() != service {
            return Err(ConfigError::PaddedNamespace(service));
        }
        Ok(Self(service))
    }

    /// The service string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
