//! Tests for the credential store facade

use super::*;
use crate::attributes::{ItemClass, MatchLimit};
use crate::error::SharedCredentialError;
use crate::secure_store::MockSecureStore;
use crate::shared::{MemorySharedCredentials, UnsupportedSharedCredentials};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn ns() -> Namespace {
    Namespace::new("com.example.app").unwrap()
}

fn memory_store() -> (CredentialStore, Arc<MemoryStore>) {
    let backend = Arc::new(MemoryStore::new());
    let store = CredentialStore::new(ns(), backend.clone());
    (store, backend)
}

#[test]
fn test_add_then_fetch() {
    let (store, _) = memory_store();

    assert!(store.add(&Credential::new("alice", "t")));
    assert_eq!(store.fetch(), Some(Credential::new("alice", "t")));
}

#[test]
fn test_add_replaces_not_merges() {
    let (store, backend) = memory_store();

    assert!(store.add(&Credential::new("alice", "one")));
    assert!(store.add(&Credential::new("bob", "two")));

    assert_eq!(store.fetch(), Some(Credential::new("bob", "two")));
    assert_eq!(backend.len(), 1);
}

#[test]
fn test_delete_then_fetch() {
    let (store, backend) = memory_store();

    store.add(&Credential::new("alice", "t"));
    assert!(store.delete());
    assert_eq!(store.fetch(), None);
    assert!(backend.is_empty());
}

#[test]
fn test_delete_empty_slot_reports_false() {
    let (store, _) = memory_store();

    assert!(!store.delete());
    assert_eq!(store.fetch(), None);
}

#[test]
fn test_fetch_credential_parts() {
    let (store, _) = memory_store();

    assert_eq!(store.fetch_credential(CredentialPart::Username), None);
    assert_eq!(store.fetch_credential(CredentialPart::Secret), None);

    store.add(&Credential::new("alice", "t"));
    assert_eq!(
        store.fetch_credential(CredentialPart::Username).as_deref(),
        Some("alice")
    );
    assert_eq!(
        store.fetch_credential(CredentialPart::Secret).as_deref(),
        Some("t")
    );
}

#[test]
fn test_lifecycle_scenario() {
    let (store, _) = memory_store();

    assert!(store.add(&Credential::new("bob", "p@ss")));
    assert_eq!(store.fetch(), Some(Credential::new("bob", "p@ss")));

    assert!(store.add(&Credential::new("bob", "new")));
    assert_eq!(store.fetch(), Some(Credential::new("bob", "new")));

    assert!(store.delete());
    assert_eq!(store.fetch(), None);
    assert!(!store.delete());
}

#[test]
fn test_namespaces_are_isolated() {
    let backend = Arc::new(MemoryStore::new());
    let app = CredentialStore::new(ns(), backend.clone());
    let other = CredentialStore::new(Namespace::new("com.example.other").unwrap(), backend.clone());

    app.add(&Credential::new("alice", "a"));
    other.add(&Credential::new("bob", "b"));

    assert!(app.delete());
    assert_eq!(app.fetch(), None);
    assert_eq!(other.fetch(), Some(Credential::new("bob", "b")));
}

#[test]
fn test_add_writes_expected_attributes() {
    let (store, backend) = memory_store();
    let store = store.with_accessibility(Accessibility::WhenUnlockedThisDeviceOnly);

    store.add(&Credential::new("alice", "t"));

    let item = backend
        .find_one(
            &store
                .query(QueryKind::Update)
                .with(AttributeKey::ReturnAttributes, AttributeValue::Flag(true)),
        )
        .unwrap();
    assert_eq!(item.text(AttributeKey::Service), Some("com.example.app"));
    assert_eq!(item.text(AttributeKey::Account), Some("alice"));
    assert_eq!(
        item.get(AttributeKey::Class),
        Some(&AttributeValue::Class(ItemClass::GenericPassword))
    );
    assert_eq!(
        item.get(AttributeKey::Accessible),
        Some(&AttributeValue::Accessible(
            Accessibility::WhenUnlockedThisDeviceOnly
        ))
    );
}

#[test]
fn test_fetch_is_lenient_about_payload() {
    let (store, backend) = memory_store();

    // Written by someone else: no account, payload not UTF-8.
    backend
        .seed(
            store
                .query(QueryKind::Update)
                .with(AttributeKey::ValueData, AttributeValue::data(&[0xc3, 0x28])),
        )
        .unwrap();

    let credential = store.fetch().expect("item exists");
    assert_eq!(credential.username(), "");
    assert!(credential.secret().is_empty());
}

#[test]
fn test_add_recovers_from_foreign_duplicates() {
    let (store, backend) = memory_store();

    for account in ["x", "y"] {
        backend
            .seed(
                store
                    .query(QueryKind::Update)
                    .with(AttributeKey::Account, AttributeValue::text(account)),
            )
            .unwrap();
    }

    assert!(store.add(&Credential::new("alice", "t")));
    assert_eq!(backend.len(), 1);
    assert_eq!(store.fetch(), Some(Credential::new("alice", "t")));
}

#[test]
fn test_query_shapes() {
    let (store, _) = memory_store();

    let fetch = store.query(QueryKind::Fetch);
    assert_eq!(fetch.match_limit(), Some(MatchLimit::One));
    assert!(fetch.flag(AttributeKey::ReturnAttributes));
    assert!(fetch.flag(AttributeKey::ReturnData));

    let update = store.query(QueryKind::Update);
    assert!(update.match_limit().is_none());
    assert!(!update.contains(AttributeKey::ReturnAttributes));
    assert!(!update.contains(AttributeKey::ReturnData));
}

#[test]
fn test_add_sequence_against_mock() {
    let mut backend = MockSecureStore::new();
    let mut seq = mockall::Sequence::new();

    backend.expect_name().return_const("mock");
    backend
        .expect_find_one()
        .withf(|q| q.match_limit() == Some(MatchLimit::One))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            Ok(AttributeSet::new()
                .with(AttributeKey::Account, AttributeValue::text("old"))
                .with(AttributeKey::ValueData, AttributeValue::data(b"old")))
        });
    backend
        .expect_delete_matching()
        .withf(|q| q.len() == 2 && q.text(AttributeKey::Service) == Some("com.example.app"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    backend
        .expect_insert()
        .withf(|a| {
            a.text(AttributeKey::Account) == Some("bob")
                && a.data(AttributeKey::ValueData) == Some(b"p@ss".as_slice())
                && a.get(AttributeKey::Accessible)
                    == Some(&AttributeValue::Accessible(Accessibility::AfterFirstUnlock))
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let store = CredentialStore::new(ns(), Arc::new(backend));
    assert!(store.add(&Credential::new("bob", "p@ss")));
}

#[test]
fn test_add_skips_delete_when_empty() {
    let mut backend = MockSecureStore::new();

    backend.expect_name().return_const("mock");
    backend
        .expect_find_one()
        .returning(|_| Err(StoreError::ItemNotFound));
    backend.expect_delete_matching().never();
    backend.expect_insert().times(1).returning(|_| Ok(()));

    let store = CredentialStore::new(ns(), Arc::new(backend));
    assert!(store.add(&Credential::new("bob", "p@ss")));
}

#[test]
fn test_store_failures_fold_to_false_and_none() {
    let mut backend = MockSecureStore::new();

    backend.expect_name().return_const("mock");
    backend
        .expect_find_one()
        .returning(|_| Err(StoreError::Backend("daemon unavailable".to_string())));
    backend
        .expect_insert()
        .returning(|_| Err(StoreError::DuplicateItem));
    backend
        .expect_delete_matching()
        .returning(|_| Err(StoreError::Unsupported("locked".to_string())));

    let store = CredentialStore::new(ns(), Arc::new(backend));
    assert!(!store.add(&Credential::new("bob", "p@ss")));
    assert_eq!(store.fetch(), None);
    assert!(!store.exists());
    assert!(!store.delete());
}

#[test]
fn test_concurrent_adds_leave_one_entry() {
    let backend = Arc::new(MemoryStore::new());
    let store = Arc::new(CredentialStore::new(ns(), backend.clone()));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store.add(&Credential::new(format!("user-{i}"), format!("secret-{i}")))
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }

    assert_eq!(backend.len(), 1);
    let credential = store.fetch().expect("one credential stored");
    let index = credential
        .username()
        .strip_prefix("user-")
        .expect("well-formed username");
    assert_eq!(credential.secret().expose(), format!("secret-{index}"));
}

#[test]
fn test_fetch_secret_or_else_prefers_override() {
    let (store, _) = memory_store();

    assert!(store.fetch_secret_or_else(|| None).is_none());

    store.add(&Credential::new("alice", "stored"));
    assert_eq!(store.fetch_secret_or_else(|| None).unwrap().expose(), "stored");
    assert_eq!(
        store
            .fetch_secret_or_else(|| Some("from-env".to_string()))
            .unwrap()
            .expose(),
        "from-env"
    );
}

#[test]
fn test_fetch_secret_or_env_falls_back_to_store() {
    let (store, _) = memory_store();
    store.add(&Credential::new("alice", "stored"));

    let secret = store.fetch_secret_or_env("KEYSLOT_TEST_UNSET_SECRET_VARIABLE");
    assert_eq!(secret.unwrap().expose(), "stored");
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_mirror_upserts_and_removes() {
    let shared = Arc::new(MemorySharedCredentials::new());
    let store = CredentialStore::in_memory(ns()).with_shared_credentials(shared.clone());

    store.mirror_to_shared_credential_store("bob", Some("p@ss"), "example.com");
    wait_for(|| shared.get("example.com", "bob").is_some()).await;
    assert_eq!(shared.get("example.com", "bob").as_deref(), Some("p@ss"));

    store.mirror_to_shared_credential_store("bob", None, "example.com");
    wait_for(|| shared.is_empty()).await;
}

struct CountingFailure {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl SharedCredentialService for CountingFailure {
    async fn upsert(
        &self,
        _domain: &str,
        _account: &str,
        _secret: Option<&str>,
    ) -> Result<(), SharedCredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SharedCredentialError::Rejected("throttled".to_string()))
    }
}

#[tokio::test]
async fn test_mirror_failure_is_swallowed_and_not_retried() {
    let shared = Arc::new(CountingFailure {
        calls: AtomicUsize::new(0),
    });
    let store = CredentialStore::in_memory(ns()).with_shared_credentials(shared.clone());

    store.mirror_to_shared_credential_store("bob", Some("p@ss"), "example.com");
    wait_for(|| shared.calls.load(Ordering::SeqCst) == 1).await;

    // Give a retry the chance to happen; none should.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(shared.calls.load(Ordering::SeqCst), 1);

    // Primary store unaffected.
    assert!(store.add(&Credential::new("bob", "p@ss")));
    assert!(store.exists());
}

#[tokio::test]
async fn test_mirror_unsupported_facility() {
    let store = CredentialStore::in_memory(ns())
        .with_shared_credentials(Arc::new(UnsupportedSharedCredentials));

    store.mirror_to_shared_credential_store("bob", Some("p@ss"), "example.com");
    tokio::task::yield_now().await;
    assert!(!store.exists());
}

#[test]
fn test_mirror_outside_runtime_still_delivers() {
    let shared = Arc::new(MemorySharedCredentials::new());
    let store = CredentialStore::in_memory(ns()).with_shared_credentials(shared.clone());

    store.mirror_to_shared_credential_store("bob", Some("p@ss"), "example.com");

    for _ in 0..200 {
        if shared.get("example.com", "bob").is_some() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(shared.get("example.com", "bob").as_deref(), Some("p@ss"));
}

#[test]
fn test_mirror_without_facility_is_noop() {
    let store = CredentialStore::in_memory(ns());

    store.mirror_to_shared_credential_store("bob", Some("p@ss"), "example.com");
    assert!(!store.exists());
}

#[test]
fn test_debug_hides_secrets() {
    let (store, _) = memory_store();
    store.add(&Credential::new("alice", "hunter2"));

    let credential = store.fetch().unwrap();
    assert!(!format!("{:?}", credential).contains("hunter2"));
    assert!(format!("{:?}", store).contains("com.example.app"));
}
