//! Keyslot Crypto — at-rest sealing for file-backed credential stores.
//!
//! Platforms without a native secure store fall back to an encrypted file.
//! This crate provides the sealing primitive for that file:
//! - A 256-bit key is derived from a master secret via HKDF-SHA256
//! - Every seal uses a fresh random 96-bit nonce (no reuse)
//! - AES-256-GCM authenticates the payload, so tampering is detected
//! - Key material implements `Zeroize` for automatic memory cleanup

#![forbid(unsafe_code)]

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Current sealed-blob format version.
pub const FORMAT_VERSION: u8 = 1;

/// HKDF info string binding derived keys to this use.
const KEY_INFO: &[u8] = b"keyslot-file-store-v1";

/// Error types for crypto operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Encryption failed
    EncryptionFailed,
    /// Decryption failed (wrong key, tampered data, or invalid nonce)
    DecryptionFailed,
    /// Key derivation failed
    KeyDerivationFailed,
    /// Invalid data format
    InvalidFormat(String),
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EncryptionFailed => write!(f, "encryption failed"),
            Self::DecryptionFailed => write!(f, "decryption failed"),
            Self::KeyDerivationFailed => write!(f, "key derivation failed"),
            Self::InvalidFormat(msg) => write!(f, "invalid format: {}", msg),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// A sealed payload.
///
/// Carries everything needed to open it except the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedData {
    /// Format version (currently 1)
    pub version: u8,
    /// 12-byte nonce (GCM standard)
    pub nonce: [u8; 12],
    /// Ciphertext including the 16-byte GCM tag
    pub ciphertext: Vec<u8>,
}

impl SealedData {
    /// Flatten into `version || nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 12 + self.ciphertext.len());
        out.push(self.version);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the layout produced by [`SealedData::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 1 + 12 {
            return Err(CryptoError::InvalidFormat(format!(
                "sealed blob too short: {} bytes",
                bytes.len()
            )));
        }
        let (version, rest) = bytes.split_at(1);
        let (nonce, ciphertext) = rest.split_at(12);
        let mut nonce_bytes = [0u8; 12];
        nonce_bytes.copy_from_slice(nonce);
        Ok(Self {
            version: version[0],
            nonce: nonce_bytes,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// AES-256-GCM cipher for a credential file.
///
/// Implements `Zeroize` + `ZeroizeOnDrop` so the key is wiped when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct FileCipher {
    key: [u8; 32],
}

impl FileCipher {
    /// Create a cipher from a raw 256-bit key.
    pub fn from_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive the file key from a master secret.
    ///
    /// The salt scopes the key, so two stores sharing a master secret but
    /// using different salts cannot read each other's files.
    pub fn derive(master_secret: &[u8], salt: &[u8]) -> Result<Self> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), master_secret);
        let mut key = [0u8; 32];
        hkdf.expand(KEY_INFO, &mut key)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;
        Ok(Self { key })
    }

    /// Seal plaintext under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedData> {
        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::EncryptionFailed)?;

        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(SealedData {
            version: FORMAT_VERSION,
            nonce: nonce_bytes,
            ciphertext,
        })
    }

    /// Open a sealed payload.
    pub fn open(&self, data: &SealedData) -> Result<Vec<u8>> {
        if data.version != FORMAT_VERSION {
            return Err(CryptoError::InvalidFormat(format!(
                "unsupported version: {}",
                data.version
            )));
        }

        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::DecryptionFailed)?;
        let nonce = Nonce::from_slice(&data.nonce);

        cipher
            .decrypt(nonce, data.ciphertext.as_ref())
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

impl std::fmt::Debug for FileCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
