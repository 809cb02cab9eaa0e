//! Configuration loading
//!
//! Layers, lowest priority first: embedded defaults, an optional
//! `config/keyslot` file, then `KEYSLOT_*` environment variables.

use crate::attributes::Accessibility;
use crate::backends::CredentialBackend;
use crate::error::ConfigError;
use crate::namespace::Namespace;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Environment variable prefix
pub const ENV_PREFIX: &str = "KEYSLOT";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyslotConfig {
    /// Secure store settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Shared web-credential settings
    #[serde(default)]
    pub shared: SharedConfig,
}

/// Secure store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Namespace that owns the credential slot
    #[serde(default)]
    pub service: String,
    /// Backend selection
    #[serde(default)]
    pub backend: CredentialBackend,
    /// Accessibility policy written with new items
    #[serde(default)]
    pub accessibility: Accessibility,
    /// Location of the encrypted file backend; unset or empty uses the data dir
    #[serde(default)]
    pub encrypted_file_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Configured encrypted file location, ignoring blank values
    #[must_use]
    pub fn encrypted_file_path(&self) -> Option<&Path> {
        self.encrypted_file_path
            .as_deref()
            .filter(|path| !path.as_os_str().to_string_lossy().trim().is_empty())
    }

    /// Resolve the namespace, failing when it is unset.
    pub fn namespace(&self) -> Result<Namespace, ConfigError> {
        Namespace::new(self.service.as_str())
    }
}

/// Shared web-credential settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Public domain the app is registered for
    #[serde(default)]
    pub domain: Option<String>,
}

impl SharedConfig {
    /// Configured domain, ignoring blank values
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Load configuration from files and environment
pub fn load_config() -> Result<KeyslotConfig, ConfigError> {
    build_config(None, None)
}

/// Build configuration from the default layers plus optional overrides.
///
/// `overrides` is TOML layered above the config file; `env` replaces the
/// process environment when given.
pub fn build_config(
    overrides: Option<&str>,
    env: Option<config::Map<String, String>>,
) -> Result<KeyslotConfig, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name("config/keyslot").required(false));

    if let Some(toml) = overrides {
        builder = builder.add_source(File::from_str(toml, FileFormat::Toml));
    }

    let config = builder
        // prefix_separator("_") makes KEYSLOT_STORE__SERVICE map to store.service
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
