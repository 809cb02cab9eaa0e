//! Shared web-credential boundary
//!
//! Some platforms can publish a username/secret pair for a public domain so
//! browsers and companion apps can autofill it. The credential store only
//! ever notifies this facility; it never waits for or inspects the result.

use crate::error::SharedCredentialError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Upsert interface to a shared web-credential facility.
///
/// `secret = None` asks the facility to remove the shared entry for
/// `(domain, account)`. Errors returned here are intentionally unobserved by
/// [`crate::CredentialStore`]: they are not reported to the user and the
/// call is never retried.
#[async_trait]
pub trait SharedCredentialService: Send + Sync {
    /// Insert, update, or (with `None`) delete a shared credential
    async fn upsert(
        &self,
        domain: &str,
        account: &str,
        secret: Option<&str>,
    ) -> Result<(), SharedCredentialError>;
}

/// Facility for platforms that have no shared web credentials
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedSharedCredentials;

#[async_trait]
impl SharedCredentialService for UnsupportedSharedCredentials {
    async fn upsert(
        &self,
        _domain: &str,
        _account: &str,
        _secret: Option<&str>,
    ) -> Result<(), SharedCredentialError> {
        Err(SharedCredentialError::Unsupported)
    }
}

/// In-process facility that records upserts
#[derive(Debug, Default)]
pub struct MemorySharedCredentials {
    entries: RwLock<HashMap<(String, String), String>>,
}

impl MemorySharedCredentials {
    /// Create an empty facility
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Secret currently shared for `(domain, account)`
    pub fn get(&self, domain: &str, account: &str) -> Option<String> {
        self.entries
            .read()
            .ok()?
            .get(&(domain.to_string(), account.to_string()))
            .cloned()
    }

    /// Number of shared entries
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether nothing is shared
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SharedCredentialService for MemorySharedCredentials {
    async fn upsert(
        &self,
        domain: &str,
        account: &str,
        secret: Option<&str>,
    ) -> Result<(), SharedCredentialError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| SharedCredentialError::Rejected(format!("Lock poisoned: {}", e)))?;
        let key = (domain.to_string(), account.to_string());
        match secret {
            Some(secret) => {
                entries.insert(key, secret.to_string());
            }
            None => {
                entries.remove(&key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_upsert_and_remove() {
        let shared = MemorySharedCredentials::new();

        shared.upsert("example.com", "bob", Some("p@ss")).await.unwrap();
        assert_eq!(shared.get("example.com", "bob").as_deref(), Some("p@ss"));

        shared.upsert("example.com", "bob", Some("new")).await.unwrap();
        assert_eq!(shared.get("example.com", "bob").as_deref(), Some("new"));
        assert_eq!(shared.len(), 1);

        shared.upsert("example.com", "bob", None).await.unwrap();
        assert!(shared.is_empty());
    }

    #[test]
    fn test_unsupported() {
        let result = tokio_test::block_on(UnsupportedSharedCredentials.upsert(
            "example.com",
            "bob",
            None,
        ));
        assert!(matches!(result, Err(SharedCredentialError::Unsupported)));
    }
}
