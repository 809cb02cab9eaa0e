//! macOS Keychain backend
//!
//! Talks to the login keychain through the `security` tool. Every item is a
//! generic password keyed by service (`-s`) and account (`-a`).

use super::{ensure_match_keys, require_text};
use crate::attributes::{AttributeKey, AttributeSet};
#[cfg(target_os = "macos")]
use crate::attributes::AttributeValue;
use crate::error::{StoreError, StoreResult};
use crate::secure_store::SecureStore;
#[cfg(target_os = "macos")]
use tracing::debug;

/// `security` exit status for errSecItemNotFound
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
const EXIT_NOT_FOUND: i32 = 44;
/// `security` exit status for errSecDuplicateItem
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
const EXIT_DUPLICATE: i32 = 45;
/// Upper bound on items removed by one `delete_matching`
#[cfg(target_os = "macos")]
const MAX_DELETE_ROUNDS: usize = 64;

/// Login-keychain store.
///
/// `security add-generic-password` takes the secret as a `-w` argument, so
/// it is visible in the process list to other local users for as long as
/// the tool runs. Prefer the `native-keyring` backend where that matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeychainStore;

impl KeychainStore {
    /// Create a handle to the login keychain
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Map a failed `security` invocation to a store status
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn classify_failure(code: Option<i32>, stderr: &str) -> StoreError {
    match code {
        Some(EXIT_NOT_FOUND) => StoreError::ItemNotFound,
        Some(EXIT_DUPLICATE) => StoreError::DuplicateItem,
        _ if stderr.contains("could not be found") => StoreError::ItemNotFound,
        _ if stderr.contains("already exists") => StoreError::DuplicateItem,
        _ => StoreError::Backend(format!("Keychain error: {}", stderr.trim())),
    }
}

/// Pull the account out of `find-generic-password` attribute output.
///
/// The relevant line looks like `    "acct"<blob>="bob"`; an account that was
/// stored empty shows as `"acct"<blob>=<NULL>`.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn parse_account(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("\"acct\"<blob>=")?;
        let quoted = rest.strip_prefix('"')?.strip_suffix('"')?;
        Some(quoted.to_string())
    })
}

#[cfg(target_os = "macos")]
fn run_security(args: &[&str]) -> StoreResult<std::process::Output> {
    std::process::Command::new("security")
        .args(args)
        .output()
        .map_err(|e| StoreError::Backend(format!("Failed to run security: {}", e)))
}

#[cfg(target_os = "macos")]
fn check(output: std::process::Output) -> StoreResult<std::process::Output> {
    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(output.status.code(), &stderr))
    }
}

/// `-s`/`-a` selector arguments for a query
#[cfg(target_os = "macos")]
fn selector_args(query: &AttributeSet) -> StoreResult<Vec<String>> {
    let mut args = vec!["-s".to_string(), require_text(query, AttributeKey::Service)?.to_string()];
    if let Some(account) = query.text(AttributeKey::Account) {
        args.push("-a".to_string());
        args.push(account.to_string());
    }
    Ok(args)
}

#[cfg(target_os = "macos")]
impl SecureStore for KeychainStore {
    fn insert(&self, attributes: &AttributeSet) -> StoreResult<()> {
        let service = require_text(attributes, AttributeKey::Service)?;
        let account = attributes.text(AttributeKey::Account).unwrap_or_default();
        let secret = attributes
            .data(AttributeKey::ValueData)
            .map(|d| std::str::from_utf8(d))
            .transpose()
            .map_err(|_| StoreError::InvalidQuery("Keychain payload must be UTF-8".to_string()))?
            .unwrap_or_default();

        debug!(service = %service, "Adding keychain item");
        // No -U: an existing item must surface as a duplicate.
        check(run_security(&[
            "add-generic-password",
            "-s",
            service,
            "-a",
            account,
            "-w",
            secret,
        ])?)?;
        Ok(())
    }

    fn delete_matching(&self, query: &AttributeSet) -> StoreResult<()> {
        ensure_match_keys(query)?;
        let selector = selector_args(query)?;

        let mut deleted = 0usize;
        for _ in 0..MAX_DELETE_ROUNDS {
            let mut args = vec!["delete-generic-password"];
            args.extend(selector.iter().map(String::as_str));
            match check(run_security(&args)?) {
                Ok(_) => deleted += 1,
                Err(StoreError::ItemNotFound) => break,
                Err(e) => return Err(e),
            }
        }

        debug!(deleted, "Deleted keychain items");
        if deleted == 0 {
            Err(StoreError::ItemNotFound)
        } else {
            Ok(())
        }
    }

    fn find_one(&self, query: &AttributeSet) -> StoreResult<AttributeSet> {
        ensure_match_keys(query)?;
        let selector = selector_args(query)?;
        let service = require_text(query, AttributeKey::Service)?;

        let mut result = AttributeSet::new();

        let mut args = vec!["find-generic-password"];
        args.extend(selector.iter().map(String::as_str));
        let attrs = check(run_security(&args)?)?;

        if query.flag(AttributeKey::ReturnAttributes) {
            result.insert(AttributeKey::Service, AttributeValue::text(service));
            if let Some(account) = parse_account(&String::from_utf8_lossy(&attrs.stdout)) {
                result.insert(AttributeKey::Account, AttributeValue::Text(account));
            }
        }

        if query.flag(AttributeKey::ReturnData) {
            args.push("-w");
            let output = check(run_security(&args)?)?;
            let mut data = output.stdout;
            if data.last() == Some(&b'\n') {
                data.pop();
            }
            result.insert(AttributeKey::ValueData, AttributeValue::data(&data));
            zeroize::Zeroize::zeroize(&mut data);
        }

        Ok(result)
    }

    fn name(&self) -> &'static str {
        "keychain"
    }
}

#[cfg(not(target_os = "macos"))]
impl SecureStore for KeychainStore {
    fn insert(&self, _attributes: &AttributeSet) -> StoreResult<()> {
        Err(unsupported())
    }

    fn delete_matching(&self, query: &AttributeSet) -> StoreResult<()> {
        ensure_match_keys(query)?;
        require_text(query, AttributeKey::Service)?;
        Err(unsupported())
    }

    fn find_one(&self, _query: &AttributeSet) -> StoreResult<AttributeSet> {
        Err(unsupported())
    }

    fn name(&self) -> &'static str {
        "keychain"
    }
}

#[cfg(not(target_os = "macos"))]
fn unsupported() -> StoreError {
    StoreError::Unsupported("Keychain only available on macOS".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(Some(44), ""),
            StoreError::ItemNotFound
        ));
        assert!(matches!(
            classify_failure(Some(45), ""),
            StoreError::DuplicateItem
        ));
        assert!(matches!(
            classify_failure(
                Some(1),
                "security: SecKeychainSearchCopyNext: The specified item could not be found in the keychain."
            ),
            StoreError::ItemNotFound
        ));
        assert!(matches!(
            classify_failure(Some(51), "User interaction is not allowed."),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn test_parse_account() {
        let stdout = r#"keychain: "/Users/bob/Library/Keychains/login.keychain-db"
version: 512
class: "genp"
attributes:
    0x00000007 <blob>="com.example.app"
    "acct"<blob>="bob"
    "svce"<blob>="com.example.app"
"#;
        assert_eq!(parse_account(stdout), Some("bob".to_string()));
        assert_eq!(parse_account("    \"acct\"<blob>=<NULL>\n"), None);
    }
}
