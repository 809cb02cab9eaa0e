//! Keyslot - single-slot credential storage
//!
//! Process bootstrap for applications that keep one username/secret pair in
//! the platform secure store. Resolve configuration once at startup, then
//! hand the resulting [`CredentialStore`] to the rest of the program:
//!
//! ```no_run
//! let store = keyslot::bootstrap()?;
//! if let Some(credential) = store.fetch() {
//!     println!("signed in as {}", credential.username());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use keyslot_core::*;

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "keyslot=info,keyslot_core=info";

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Load `.env`, configuration and logging, then open the credential store.
///
/// Fails when the namespace is not configured or the selected backend is
/// unavailable; callers should abort startup in that case.
pub fn bootstrap() -> Result<CredentialStore> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = load_config().context("Failed to load keyslot configuration")?;
    open_store(&config)
}

/// Open the credential store described by `config`.
pub fn open_store(config: &KeyslotConfig) -> Result<CredentialStore> {
    open_store_with_shared(config, Arc::new(UnsupportedSharedCredentials))
}

/// Open the credential store with a specific shared web-credential facility.
///
/// The facility is attached only when `shared.domain` is configured. The
/// configured domain is not checked against the `public_domain` passed to
/// each [`CredentialStore::mirror_to_shared_credential_store`] call; mirror
/// calls reach the facility under whatever domain the caller names.
pub fn open_store_with_shared(
    config: &KeyslotConfig,
    shared: Arc<dyn SharedCredentialService>,
) -> Result<CredentialStore> {
    let namespace = config
        .store
        .namespace()
        .context("Credential namespace must be configured before any store operation")?;
    let backend = open_backend(&config.store)
        .with_context(|| format!("Failed to open {:?} credential backend", config.store.backend))?;

    info!(
        namespace = %namespace,
        backend = backend.name(),
        "Credential store ready"
    );

    let store =
        CredentialStore::new(namespace, backend).with_accessibility(config.store.accessibility);

    if config.store.backend == CredentialBackend::Memory {
        warn!("Using in-memory credential backend; credentials will not persist");
    }

    match config.shared.domain() {
        Some(domain) => {
            info!(domain = %domain, "Shared web credentials enabled");
            Ok(store.with_shared_credentials(shared))
        }
        None => Ok(store),
    }
}
