//! Encrypted file backend using AES-256-GCM
//!
//! For platforms without a native secure store. Items are kept as a JSON
//! array, sealed with [`keyslot_crypto::FileCipher`] and written base64
//! encoded. Every mutation is a load → modify → save cycle under a lock, and
//! each save replaces the file through a rename so readers never see a
//! partial write.
//!
//! A file that can no longer be decoded or decrypted (truncated, or sealed
//! under another master secret) is moved aside to `<file>.corrupt` by the
//! next delete, which returns the slot to empty.

use super::{ensure_match_keys, handle_lock_poison, is_same_item, StoredItem};
use crate::attributes::AttributeSet;
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::secure_store::SecureStore;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use keyslot_crypto::{FileCipher, SealedData};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Environment variable holding the master secret
pub const ENV_MASTER_KEY: &str = "KEYSLOT_MASTER_KEY";

const KEY_SALT: &[u8] = b"keyslot-credential-store-v1";
const DATA_DIR_NAME: &str = ".keyslot";
const FILE_NAME: &str = "credentials.enc";
const TEMP_SUFFIX: &str = ".tmp";
const CORRUPT_SUFFIX: &str = ".corrupt";

/// Encrypted credential file
pub struct EncryptedFileStore {
    path: PathBuf,
    cipher: FileCipher,
    io_lock: Mutex<()>,
}

impl std::fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileStore {
    /// Open a store at `path` keyed by `master_secret`
    pub fn open(path: impl Into<PathBuf>, master_secret: &[u8]) -> StoreResult<Self> {
        let cipher = FileCipher::derive(master_secret, KEY_SALT)?;
        let path = path.into();
        info!(path = %path.display(), "Using encrypted credential file");
        Ok(Self {
            path,
            cipher,
            io_lock: Mutex::new(()),
        })
    }

    /// Default file location: `<data dir>/.keyslot/credentials.enc`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(ConfigError::DataDir)?;
        Ok(data_dir.join(DATA_DIR_NAME).join(FILE_NAME))
    }

    /// Master secret from [`ENV_MASTER_KEY`], else a machine-specific value.
    ///
    /// The fallback only ties the file to this host and user; set the
    /// environment variable for real protection.
    #[must_use]
    pub fn master_secret() -> String {
        std::env::var(ENV_MASTER_KEY).unwrap_or_else(|_| {
            let hostname = hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "keyslot-default".to_string());
            let username = std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "keyslot-user".to_string());
            format!("keyslot-auto-key-{}-{}", hostname, username)
        })
    }

    /// File backing this store
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<Vec<StoredItem>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let encoded = std::fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Backend(format!("Failed to read credentials file: {}", e)))?;
        let sealed = BASE64
            .decode(encoded.trim())
            .map_err(|e| StoreError::Encryption(format!("Failed to decode credentials: {}", e)))?;
        let plaintext = zeroize::Zeroizing::new(
            self.cipher.open(&SealedData::from_bytes(&sealed)?)?,
        );

        let items: Vec<StoredItem> = serde_json::from_slice(&plaintext)
            .map_err(|e| StoreError::Encryption(format!("Failed to parse credentials: {}", e)))?;
        debug!(count = items.len(), "Loaded credentials from encrypted file");
        Ok(items)
    }

    fn save(&self, items: &[StoredItem]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("Failed to create directory: {}", e)))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
            }
        }

        let json = zeroize::Zeroizing::new(serde_json::to_vec(items).map_err(|e| {
            StoreError::Backend(format!("Failed to serialize credentials: {}", e))
        })?);
        let sealed = self.cipher.seal(&json)?;

        let temp_path = self.sibling(TEMP_SUFFIX);
        write_owner_only(&temp_path, BASE64.encode(sealed.to_bytes()).as_bytes()).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            StoreError::Backend(format!("Failed to write credentials file: {}", e))
        })?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            StoreError::Backend(format!("Failed to replace credentials file: {}", e))
        })?;

        debug!(path = %self.path.display(), "Saved credentials to encrypted file");
        Ok(())
    }

    /// Move an unreadable file out of the way so the slot starts empty again
    fn quarantine(&self, reason: &str) -> StoreResult<()> {
        let target = self.sibling(CORRUPT_SUFFIX);
        std::fs::rename(&self.path, &target).map_err(|e| {
            StoreError::Backend(format!("Failed to move unreadable credentials file: {}", e))
        })?;
        warn!(
            path = %self.path.display(),
            moved_to = %target.display(),
            reason = %reason,
            "Unreadable credentials file moved aside"
        );
        Ok(())
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }
}

fn write_owner_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl SecureStore for EncryptedFileStore {
    fn insert(&self, attributes: &AttributeSet) -> StoreResult<()> {
        let new_item = StoredItem::from_attributes(attributes)?;
        let _guard = self.io_lock.lock().map_err(handle_lock_poison)?;

        let mut items = self.load()?;
        if items
            .iter()
            .any(|item| is_same_item(&item.to_attributes(), attributes))
        {
            return Err(StoreError::DuplicateItem);
        }
        items.push(new_item);
        self.save(&items)
    }

    fn delete_matching(&self, query: &AttributeSet) -> StoreResult<()> {
        ensure_match_keys(query)?;
        let _guard = self.io_lock.lock().map_err(handle_lock_poison)?;

        let mut items = match self.load() {
            Err(StoreError::Encryption(reason)) => return self.quarantine(&reason),
            other => other?,
        };
        let before = items.len();
        items.retain(|item| !query.selects(&item.to_attributes()));
        if items.len() == before {
            return Err(StoreError::ItemNotFound);
        }
        self.save(&items)
    }

    fn find_one(&self, query: &AttributeSet) -> StoreResult<AttributeSet> {
        ensure_match_keys(query)?;
        let _guard = self.io_lock.lock().map_err(handle_lock_poison)?;

        self.load()?
            .iter()
            .map(StoredItem::to_attributes)
            .find(|item| query.selects(item))
            .map(|item| query.project(&item))
            .ok_or(StoreError::ItemNotFound)
    }

    fn name(&self) -> &'static str {
        "encrypted_file"
    }
}
