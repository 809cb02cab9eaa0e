//! Zeroizing string for secret payloads

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret that is wiped from memory when dropped
///
/// `Debug` and `Display` never print the value, and equality is
/// constant-time so comparing a fetched secret against a candidate does not
/// leak how many leading bytes matched.
///
/// # Example
///
/// ```
/// use keyslot_core::SecureString;
///
/// let secret = SecureString::new("p@ss");
/// assert_eq!(secret.expose(), "p@ss");
/// assert!(!format!("{:?}", secret).contains("p@ss"));
/// ```
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Wrap a secret value
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Decode a stored payload, falling back to an empty secret.
    ///
    /// Missing or non-UTF-8 data is not an error here: callers get `""`.
    #[must_use]
    pub fn decode_or_empty(bytes: Option<&[u8]>) -> Self {
        let inner = bytes
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(str::to_owned)
            .unwrap_or_default();
        Self { inner }
    }

    /// Temporarily expose the value.
    ///
    /// Keep the borrow short; do not clone it into plain `String`s.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Raw UTF-8 bytes, as written to a store
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the secret is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString([REDACTED, {} bytes])", self.inner.len())
    }
}

impl std::fmt::Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.inner.as_bytes().ct_eq(other.inner.as_bytes()).into()
    }
}

impl Eq for SecureString {}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_output() {
        let secret = SecureString::new("my-secret-value");
        assert_eq!(secret.len(), 15);

        let debug = format!("{:?}", secret);
        assert!(!debug.contains("my-secret-value"));
        assert!(debug.contains("REDACTED"));

        let display = format!("{}", secret);
        assert!(!display.contains("my-secret-value"));
        assert!(display.contains("REDACTED"));
    }

    #[test]
    fn test_equality() {
        assert_eq!(SecureString::new("a"), SecureString::from("a"));
        assert_ne!(SecureString::new("a"), SecureString::new("b"));
        assert_ne!(SecureString::new("a"), SecureString::new("aa"));
    }

    #[test]
    fn test_lenient_decode() {
        assert_eq!(
            SecureString::decode_or_empty(Some(b"p@ss".as_slice())).expose(),
            "p@ss"
        );
        assert!(SecureString::decode_or_empty(None).is_empty());
        assert!(SecureString::decode_or_empty(Some(&[0xff, 0xfe][..])).is_empty());
    }
}
