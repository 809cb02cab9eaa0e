//! Credential types

use super::secure_string::SecureString;
use serde::{Deserialize, Serialize};

/// A username/secret pair.
///
/// Immutable once built; two credentials are equal when both halves are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    secret: SecureString,
}

impl Credential {
    /// Create a new credential
    #[must_use]
    pub fn new(username: impl Into<String>, secret: impl Into<SecureString>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Account name
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The secret (password or token)
    #[must_use]
    pub fn secret(&self) -> &SecureString {
        &self.secret
    }

    /// Project one half of the pair into an owned string
    #[must_use]
    pub fn part(&self, part: CredentialPart) -> String {
        match part {
            CredentialPart::Username => self.username.clone(),
            CredentialPart::Secret => self.secret.expose().to_string(),
        }
    }
}

/// Selects which half of a stored credential to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPart {
    /// The account name
    Username,
    /// The password or token
    Secret,
}
