//! Credential store facade

use crate::attributes::{Accessibility, AttributeKey, AttributeSet, AttributeValue};
use crate::backends::MemoryStore;
use crate::credential::{Credential, CredentialPart};
use crate::error::StoreError;
use crate::namespace::Namespace;
use crate::query::{build_query, QueryKind};
use crate::secure_string::SecureString;
use crate::secure_store::SecureStore;
use crate::shared::SharedCredentialService;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Single-slot credential storage for one namespace.
///
/// Holds at most one username/secret pair in the backing [`SecureStore`]:
/// [`add`](Self::add) removes whatever is stored before inserting. Failures
/// from the store are folded into `false` / `None`; callers cannot tell
/// "not found" from "store unavailable".
///
/// `add` and `delete` are serialized through an in-process lock, so
/// concurrent calls on one `CredentialStore` never leave two entries behind.
/// Another process, or a second `CredentialStore` over the same namespace,
/// can still race the fetch → delete → insert sequence; the loser sees
/// `add` return `false` (duplicate item) or finds the slot unexpectedly
/// empty.
pub struct CredentialStore {
    namespace: Namespace,
    backend: Arc<dyn SecureStore>,
    shared: Option<Arc<dyn SharedCredentialService>>,
    accessibility: Accessibility,
    slot_lock: Mutex<()>,
}

impl CredentialStore {
    /// Create a store for `namespace` over `backend`
    #[must_use]
    pub fn new(namespace: Namespace, backend: Arc<dyn SecureStore>) -> Self {
        info!(namespace = %namespace, backend = backend.name(), "Initializing credential store");

        Self {
            namespace,
            backend,
            shared: None,
            accessibility: Accessibility::default(),
            slot_lock: Mutex::new(()),
        }
    }

    /// Create an in-memory store (for testing)
    #[must_use]
    pub fn in_memory(namespace: Namespace) -> Self {
        Self::new(namespace, Arc::new(MemoryStore::new()))
    }

    /// Attach a shared web-credential facility for mirroring
    #[must_use]
    pub fn with_shared_credentials(mut self, shared: Arc<dyn SharedCredentialService>) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Set the accessibility policy written with new items
    #[must_use]
    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    /// Namespace owning the slot
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Name of the backing store
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Attribute set for `kind` under this store's namespace
    #[must_use]
    pub fn query(&self, kind: QueryKind) -> AttributeSet {
        build_query(&self.namespace, kind)
    }

    /// Store `credential`, replacing any credential already in the slot.
    ///
    /// Returns `true` only when the store confirmed the insert. Each call
    /// performs a real delete + insert round trip, even for an identical
    /// credential.
    pub fn add(&self, credential: &Credential) -> bool {
        let _guard = self.lock_slot();

        if self.fetch().is_some() {
            self.delete_unlocked();
        }

        let attributes = self
            .query(QueryKind::Update)
            .with(
                AttributeKey::Account,
                AttributeValue::text(credential.username()),
            )
            .with(
                AttributeKey::ValueData,
                AttributeValue::data(credential.secret().as_bytes()),
            )
            .with(
                AttributeKey::Accessible,
                AttributeValue::Accessible(self.accessibility),
            );

        match self.backend.insert(&attributes) {
            Ok(()) => {
                debug!(namespace = %self.namespace, "Credential stored");
                true
            }
            Err(e) => {
                self.log_failure("add", &e);
                false
            }
        }
    }

    /// Read the stored credential.
    ///
    /// A found item with a missing or non-UTF-8 account or payload yields
    /// empty strings for those halves rather than `None`.
    pub fn fetch(&self) -> Option<Credential> {
        match self.backend.find_one(&self.query(QueryKind::Fetch)) {
            Ok(result) => {
                let username = result
                    .text(AttributeKey::Account)
                    .unwrap_or_default()
                    .to_string();
                let secret = SecureString::decode_or_empty(result.data(AttributeKey::ValueData));
                Some(Credential::new(username, secret))
            }
            Err(e) => {
                self.log_failure("fetch", &e);
                None
            }
        }
    }

    /// Read one half of the stored credential
    pub fn fetch_credential(&self, part: CredentialPart) -> Option<String> {
        self.fetch().map(|credential| credential.part(part))
    }

    /// Remove the stored credential.
    ///
    /// Returns `false` when the store reported a failure, which includes the
    /// slot already being empty. `false` means nothing changed, not that
    /// something is broken.
    pub fn delete(&self) -> bool {
        let _guard = self.lock_slot();
        self.delete_unlocked()
    }

    /// Whether a credential is stored
    pub fn exists(&self) -> bool {
        self.fetch().is_some()
    }

    /// Secret from `env_var` when set, else the stored secret
    pub fn fetch_secret_or_env(&self, env_var: &str) -> Option<SecureString> {
        self.fetch_secret_or_else(|| {
            let value = std::env::var(env_var).ok()?;
            debug!(env_var = %env_var, "Using secret from environment");
            Some(value)
        })
    }

    /// Secret from `override_secret` when it yields one, else the stored secret
    pub fn fetch_secret_or_else(
        &self,
        override_secret: impl FnOnce() -> Option<String>,
    ) -> Option<SecureString> {
        if let Some(value) = override_secret() {
            return Some(SecureString::new(value));
        }

        self.fetch().map(|credential| credential.secret().clone())
    }

    /// Publish `username`/`secret` to the shared web-credential facility.
    ///
    /// `secret = None` removes the shared entry. `public_domain` must match
    /// the domain the application is registered for.
    ///
    /// `public_domain` is passed through as given; the `shared.domain`
    /// setting only decides whether a facility is attached at bootstrap.
    ///
    /// Fire-and-forget: the upsert runs on a detached tokio task (on the
    /// caller's runtime, or a short-lived thread with its own current-thread
    /// runtime when called outside one) and its outcome is unobserved.
    /// Failures are logged at debug level only and never retried. No ordering
    /// is guaranteed against later calls on the primary store. Without an
    /// attached facility the call does nothing.
    pub fn mirror_to_shared_credential_store(
        &self,
        username: &str,
        secret: Option<&str>,
        public_domain: &str,
    ) {
        let Some(shared) = self.shared.as_ref().map(Arc::clone) else {
            debug!(namespace = %self.namespace, "No shared credential facility attached");
            return;
        };

        let domain = public_domain.to_string();
        let account = username.to_string();
        let secret = secret.map(SecureString::new);

        let update = async move {
            let result = shared
                .upsert(&domain, &account, secret.as_ref().map(SecureString::expose))
                .await;
            match result {
                Ok(()) => debug!(domain = %domain, "Shared credential updated"),
                Err(e) => debug!(domain = %domain, error = %e, "Shared credential update discarded"),
            }
        };

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(update);
            return;
        }

        let spawned = std::thread::Builder::new()
            .name("keyslot-shared-credentials".to_string())
            .spawn(move || {
                match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime.block_on(update),
                    Err(e) => debug!(error = %e, "Shared credential update dropped: no runtime"),
                }
            });
        if let Err(e) = spawned {
            debug!(error = %e, "Shared credential update dropped: thread spawn failed");
        }
    }

    fn delete_unlocked(&self) -> bool {
        match self.backend.delete_matching(&self.query(QueryKind::Update)) {
            Ok(()) => {
                debug!(namespace = %self.namespace, "Credential deleted");
                true
            }
            Err(e) => {
                self.log_failure("delete", &e);
                false
            }
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state.
        self.slot_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn log_failure(&self, operation: &'static str, error: &StoreError) {
        if error.is_expected() {
            debug!(namespace = %self.namespace, operation, error = %error, "Secure store status");
        } else {
            warn!(
                namespace = %self.namespace,
                operation,
                backend = self.backend.name(),
                error = %error,
                "Secure store call failed"
            );
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("namespace", &self.namespace)
            .field("backend", &self.backend.name())
            .field("accessibility", &self.accessibility)
            .field("shared", &self.shared.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests;
