// SPDX-License-Identifier: MIT

//! User directory tests: registration, authentication gate, collection
//! limits, permissions, password reset, and write-through discipline.

use async_trait::async_trait;
use cardfolio::clock::FixedClock;
use cardfolio::config::Config;
use cardfolio::db::{MemoryStore, Store, StoreError, WriteOutcome};
use cardfolio::error::AppError;
use cardfolio::models::{
    Collection, CollectionEntry, Credential, CredentialKind, HistoryEntry, User,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod common;

/// Store whose credential inserts can be failed independently of the user
/// table, for exercising failures that land between durable writes.
struct CredentialOutageStore {
    inner: MemoryStore,
    credentials_down: AtomicBool,
}

impl CredentialOutageStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            credentials_down: AtomicBool::new(false),
        }
    }

    fn set_credentials_down(&self, down: bool) {
        self.credentials_down.store(down, Ordering::SeqCst);
    }

    fn check_credentials(&self) -> Result<(), StoreError> {
        if self.credentials_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("credential table down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for CredentialOutageStore {
    async fn insert_user(&self, user: &User) -> Result<WriteOutcome, StoreError> {
        self.inner.insert_user(user).await
    }
    async fn update_user(&self, user: &User) -> Result<bool, StoreError> {
        self.inner.update_user(user).await
    }
    async fn fetch_user(&self, name: &str) -> Result<Option<User>, StoreError> {
        self.inner.fetch_user(name).await
    }
    async fn fetch_user_name_by_email(&self, email: &str) -> Result<Option<String>, StoreError> {
        self.inner.fetch_user_name_by_email(email).await
    }
    async fn fetch_user_names(&self) -> Result<Vec<String>, StoreError> {
        self.inner.fetch_user_names().await
    }
    async fn insert_credential(&self, cred: &Credential) -> Result<WriteOutcome, StoreError> {
        self.check_credentials()?;
        self.inner.insert_credential(cred).await
    }
    async fn fetch_credential(
        &self,
        kind: CredentialKind,
        user_name: &str,
        key: &str,
    ) -> Result<Option<Credential>, StoreError> {
        self.inner.fetch_credential(kind, user_name, key).await
    }
    async fn update_credential_window(
        &self,
        kind: CredentialKind,
        user_name: &str,
        key: &str,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.inner
            .update_credential_window(kind, user_name, key, valid_from, valid_until)
            .await
    }
    async fn delete_credentials_for_user(
        &self,
        kind: CredentialKind,
        user_name: &str,
    ) -> Result<usize, StoreError> {
        self.inner.delete_credentials_for_user(kind, user_name).await
    }
    async fn sweep_credentials(
        &self,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Result<usize, StoreError> {
        self.inner.sweep_credentials(now, retention).await
    }
    async fn insert_collection(&self, collection: &Collection) -> Result<WriteOutcome, StoreError> {
        self.inner.insert_collection(collection).await
    }
    async fn update_collection(&self, collection: &Collection) -> Result<bool, StoreError> {
        self.inner.update_collection(collection).await
    }
    async fn fetch_collections(&self, owner: &str) -> Result<Vec<Collection>, StoreError> {
        self.inner.fetch_collections(owner).await
    }
    async fn update_entry(&self, entry: &CollectionEntry) -> Result<bool, StoreError> {
        self.inner.update_entry(entry).await
    }
    async fn insert_entry(&self, entry: &CollectionEntry) -> Result<WriteOutcome, StoreError> {
        self.inner.insert_entry(entry).await
    }
    async fn fetch_entries(
        &self,
        owner: &str,
        collection: &str,
    ) -> Result<Vec<CollectionEntry>, StoreError> {
        self.inner.fetch_entries(owner, collection).await
    }
    async fn append_history(&self, row: &HistoryEntry) -> Result<(), StoreError> {
        self.inner.append_history(row).await
    }
    async fn fetch_history(
        &self,
        owner: &str,
        collection: &str,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        self.inner.fetch_history(owner, collection).await
    }
}

#[tokio::test]
async fn test_register_then_authenticate() {
    let app = common::create_test_app();
    let key = common::register(&app, "alice", "alice@example.com").await;

    let user = app
        .state
        .directory
        .authenticate_and_load("alice", &key)
        .await
        .expect("first session should authenticate");
    assert_eq!(user.name, "alice");
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.max_collections, app.state.config.default_max_collections);

    let err = app
        .state
        .directory
        .authenticate_and_load("alice", "bogus-key")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredential));
}

#[tokio::test]
async fn test_register_rejects_duplicates() {
    let app = common::create_test_app();
    common::register(&app, "alice", "alice@example.com").await;

    let err = app
        .state
        .directory
        .register_user("alice", "other@example.com", "correcthorse1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyExists(_)));

    let err = app
        .state
        .directory
        .register_user("bob", "alice@example.com", "correcthorse1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let app = common::create_test_app();

    for bad in ["short1", "not alphanumeric!", "ten__chars"] {
        let err = app
            .state
            .directory
            .register_user("alice", "alice@example.com", bad)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidField(_)));
    }

    // Nothing was created by the failed attempts.
    assert!(app.state.directory.lookup("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_and_logout() {
    let app = common::create_test_app();
    common::register(&app, "alice", "alice@example.com").await;

    let key = app
        .state
        .directory
        .login("alice", "correcthorse1")
        .await
        .unwrap();
    app.state
        .directory
        .authenticate_and_load("alice", &key)
        .await
        .unwrap();

    let err = app
        .state
        .directory
        .login("alice", "wrongpassword1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredential));

    app.state.directory.logout("alice", &key).await.unwrap();
    let err = app
        .state
        .directory
        .authenticate_and_load("alice", &key)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredential));
}

#[tokio::test]
async fn test_lookup_by_email() {
    let app = common::create_test_app();
    common::register(&app, "alice", "alice@example.com").await;

    let name = app
        .state
        .directory
        .lookup_by_email("alice@example.com")
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("alice"));

    let missing = app
        .state
        .directory
        .lookup_by_email("nobody@example.com")
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_collection_limit_and_uniqueness() {
    let app = common::create_test_app();
    common::register(&app, "alice", "alice@example.com").await;

    for name in ["binder1", "binder2", "binder3"] {
        app.state
            .directory
            .new_collection("alice", name)
            .await
            .unwrap();
    }

    let err = app
        .state
        .directory
        .new_collection("alice", "binder4")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TooManyCollections(3)));

    // Duplicate name is a conflict, not a limit problem.
    let err = app
        .state
        .directory
        .new_collection("alice", "binder1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyExists(_)));

    // A different user is unaffected by alice's limit.
    common::register(&app, "bob", "bob@example.com").await;
    app.state
        .directory
        .new_collection("bob", "binder1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_permissions_and_public_listing() {
    let app = common::create_test_app();
    common::register(&app, "alice", "alice@example.com").await;
    app.state
        .directory
        .new_collection("alice", "binder1")
        .await
        .unwrap();
    app.state
        .directory
        .new_collection("alice", "trades")
        .await
        .unwrap();

    // Everything starts private.
    let public = app
        .state
        .directory
        .collection_list("alice", true)
        .await
        .unwrap();
    assert!(public.is_empty());

    app.state
        .directory
        .set_permissions("alice", "binder1", true, false, false)
        .await
        .unwrap();

    let public = app
        .state
        .directory
        .collection_list("alice", true)
        .await
        .unwrap();
    assert_eq!(public, vec!["binder1".to_string()]);

    let all = app
        .state
        .directory
        .collection_list("alice", false)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let binder = app
        .state
        .directory
        .collection("alice", "binder1", true)
        .await
        .unwrap();
    assert_eq!(binder.privacy, cardfolio::models::Privacy::Contents);
    assert!(binder.public_viewing);
    assert!(!binder.public_history);

    // A still-private collection is invisible to public callers.
    let err = app
        .state
        .directory
        .collection("alice", "trades", true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredential));

    let err = app
        .state
        .directory
        .set_permissions("alice", "no-such-collection", true, true, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidField(_)));
}

#[tokio::test]
async fn test_change_password_consumes_token_and_revokes_sessions() {
    let app = common::create_test_app();
    let old_key = common::register(&app, "alice", "alice@example.com").await;

    let token = app
        .state
        .credentials
        .issue_reset_token("alice")
        .await
        .unwrap();

    let new_key = app
        .state
        .directory
        .change_password("alice", &token, "freshhorse22")
        .await
        .unwrap();

    // Old sessions are gone; the returned key is the only valid one.
    let err = app
        .state
        .directory
        .authenticate_and_load("alice", &old_key)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredential));
    app.state
        .directory
        .authenticate_and_load("alice", &new_key)
        .await
        .unwrap();

    // Old password no longer works, new one does.
    assert!(app
        .state
        .directory
        .login("alice", "correcthorse1")
        .await
        .is_err());
    app.state
        .directory
        .login("alice", "freshhorse22")
        .await
        .unwrap();

    // The token was consumed by the change.
    let err = app
        .state
        .directory
        .change_password("alice", &token, "anotherpass33")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredential));
}

#[tokio::test]
async fn test_failed_change_password_never_leaves_old_hash_answering() {
    // A credential-table outage after the durable password write must not
    // leave a cached snapshot that still authenticates the old password.
    let store = Arc::new(CredentialOutageStore::new());
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    let state = cardfolio::AppState::new(Config::default(), store.clone(), clock);

    state
        .directory
        .register_user("alice", "alice@example.com", "correcthorse1")
        .await
        .unwrap();
    let token = state.credentials.issue_reset_token("alice").await.unwrap();

    // The user row updates durably, then session issuance hits the outage.
    store.set_credentials_down(true);
    let err = state
        .directory
        .change_password("alice", &token, "freshhorse22")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
    store.set_credentials_down(false);

    // The durable store holds the new hash; the directory must agree.
    let err = state
        .directory
        .login("alice", "correcthorse1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredential));
    state
        .directory
        .login("alice", "freshhorse22")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_write_through_failure_rolls_back_nothing_into_cache() {
    let app = common::create_test_app();
    common::register(&app, "alice", "alice@example.com").await;
    app.state
        .directory
        .new_collection("alice", "binder1")
        .await
        .unwrap();

    // Durability goes away mid-flight.
    app.store.set_offline(true);
    let err = app
        .state
        .directory
        .new_collection("alice", "binder2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));

    // No success was reported, and the cache did not absorb the change:
    // once the store is back, the same create succeeds cleanly.
    app.store.set_offline(false);
    let all = app
        .state
        .directory
        .collection_list("alice", false)
        .await
        .unwrap();
    assert_eq!(all, vec!["binder1".to_string()]);

    app.state
        .directory
        .new_collection("alice", "binder2")
        .await
        .unwrap();
    let all = app
        .state
        .directory
        .collection_list("alice", false)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_directory_survives_cold_cache() {
    // A second directory over the same store simulates a process restart:
    // lookups read through and find the durable state.
    let app = common::create_test_app();
    common::register(&app, "alice", "alice@example.com").await;
    app.state
        .directory
        .new_collection("alice", "binder1")
        .await
        .unwrap();

    let cold = cardfolio::AppState::new(
        app.state.config.clone(),
        app.store.clone(),
        app.clock.clone(),
    );

    let user = cold.directory.lookup("alice").await.unwrap().unwrap();
    assert_eq!(user.email, "alice@example.com");

    let all = cold.directory.collection_list("alice", false).await.unwrap();
    assert_eq!(all, vec!["binder1".to_string()]);

    assert_eq!(cold.directory.warm_up().await.unwrap(), 1);
    assert_eq!(cold.directory.user_names().await, vec!["alice".to_string()]);
}
