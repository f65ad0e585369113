// SPDX-License-Identifier: MIT

//! In-process implementation of the [`Store`] seam.
//!
//! Every table sits behind its own `RwLock`, so each trait method is
//! independently atomic and uniqueness checks happen under the same lock as
//! the insert they guard. An offline mode makes every operation fail, which
//! is how tests exercise the durability-failure paths.

use crate::db::{Store, StoreError, WriteOutcome};
use crate::models::{
    Collection, CollectionEntry, Credential, CredentialKind, EntryKey, HistoryEntry, User,
    FIELD_LIMIT,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory store enforcing the same uniqueness and column-bound contracts
/// a relational backend would.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    /// Email uniqueness index: email -> user name
    emails: RwLock<HashMap<String, String>>,
    credentials: RwLock<HashMap<(CredentialKind, String, String), Credential>>,
    /// Keyed by (owner, collection name)
    collections: RwLock<HashMap<(String, String), Collection>>,
    entries: RwLock<HashMap<EntryKey, CollectionEntry>>,
    /// Ledger rows per (owner, collection), in append order
    history: RwLock<HashMap<(String, String), Vec<HistoryEntry>>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going away. While offline every operation
    /// returns [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

/// Column-bound check applied at the storage boundary.
fn check_column(field: &'static str, value: &str) -> Result<(), StoreError> {
    if value.chars().count() > FIELD_LIMIT {
        return Err(StoreError::FieldTooLong(field));
    }
    Ok(())
}

fn check_entry_columns(entry: &CollectionEntry) -> Result<(), StoreError> {
    check_column("owner", &entry.key.owner)?;
    check_column("collection", &entry.key.collection)?;
    check_column("card_name", &entry.key.card_name)?;
    check_column("set_name", &entry.key.set_name)?;
    check_column("comment", &entry.comment)
}

#[async_trait]
impl Store for MemoryStore {
    // ─── Users ───────────────────────────────────────────────────

    async fn insert_user(&self, user: &User) -> Result<WriteOutcome, StoreError> {
        self.check_online()?;
        check_column("name", &user.name)?;
        check_column("email", &user.email)?;

        let mut users = self.users.write().await;
        let mut emails = self.emails.write().await;

        if users.contains_key(&user.name) || emails.contains_key(&user.email) {
            return Ok(WriteOutcome::Conflict);
        }
        users.insert(user.name.clone(), user.clone());
        emails.insert(user.email.clone(), user.name.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn update_user(&self, user: &User) -> Result<bool, StoreError> {
        self.check_online()?;
        check_column("email", &user.email)?;

        let mut users = self.users.write().await;
        let Some(existing) = users.get_mut(&user.name) else {
            return Ok(false);
        };

        if existing.email != user.email {
            let mut emails = self.emails.write().await;
            if emails.contains_key(&user.email) {
                return Err(StoreError::UniqueViolation("email"));
            }
            emails.remove(&existing.email);
            emails.insert(user.email.clone(), user.name.clone());
        }

        *existing = user.clone();
        Ok(true)
    }

    async fn fetch_user(&self, name: &str) -> Result<Option<User>, StoreError> {
        self.check_online()?;
        Ok(self.users.read().await.get(name).cloned())
    }

    async fn fetch_user_name_by_email(&self, email: &str) -> Result<Option<String>, StoreError> {
        self.check_online()?;
        Ok(self.emails.read().await.get(email).cloned())
    }

    async fn fetch_user_names(&self) -> Result<Vec<String>, StoreError> {
        self.check_online()?;
        Ok(self.users.read().await.keys().cloned().collect())
    }

    // ─── Credentials ─────────────────────────────────────────────

    async fn insert_credential(&self, cred: &Credential) -> Result<WriteOutcome, StoreError> {
        self.check_online()?;
        check_column("user_name", &cred.user_name)?;

        let mut credentials = self.credentials.write().await;
        let id = (cred.kind, cred.user_name.clone(), cred.key.clone());
        if credentials.contains_key(&id) {
            return Ok(WriteOutcome::Conflict);
        }
        credentials.insert(id, cred.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn fetch_credential(
        &self,
        kind: CredentialKind,
        user_name: &str,
        key: &str,
    ) -> Result<Option<Credential>, StoreError> {
        self.check_online()?;
        let id = (kind, user_name.to_string(), key.to_string());
        Ok(self.credentials.read().await.get(&id).cloned())
    }

    async fn update_credential_window(
        &self,
        kind: CredentialKind,
        user_name: &str,
        key: &str,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check_online()?;
        let id = (kind, user_name.to_string(), key.to_string());
        let mut credentials = self.credentials.write().await;
        match credentials.get_mut(&id) {
            Some(cred) => {
                cred.valid_from = valid_from;
                cred.valid_until = valid_until;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_credentials_for_user(
        &self,
        kind: CredentialKind,
        user_name: &str,
    ) -> Result<usize, StoreError> {
        self.check_online()?;
        let mut credentials = self.credentials.write().await;
        let before = credentials.len();
        credentials.retain(|(k, user, _), _| !(*k == kind && user == user_name));
        Ok(before - credentials.len())
    }

    async fn sweep_credentials(
        &self,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Result<usize, StoreError> {
        self.check_online()?;
        let mut credentials = self.credentials.write().await;
        let before = credentials.len();
        credentials.retain(|_, cred| !cred.is_sweepable(now, retention));
        Ok(before - credentials.len())
    }

    // ─── Collections ─────────────────────────────────────────────

    async fn insert_collection(&self, collection: &Collection) -> Result<WriteOutcome, StoreError> {
        self.check_online()?;
        check_column("owner", &collection.owner)?;
        check_column("name", &collection.name)?;

        let mut collections = self.collections.write().await;
        let id = (collection.owner.clone(), collection.name.clone());
        if collections.contains_key(&id) {
            return Ok(WriteOutcome::Conflict);
        }
        collections.insert(id, collection.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn update_collection(&self, collection: &Collection) -> Result<bool, StoreError> {
        self.check_online()?;
        let mut collections = self.collections.write().await;
        let id = (collection.owner.clone(), collection.name.clone());
        match collections.get_mut(&id) {
            Some(existing) => {
                *existing = collection.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn fetch_collections(&self, owner: &str) -> Result<Vec<Collection>, StoreError> {
        self.check_online()?;
        let collections = self.collections.read().await;
        let mut found: Vec<Collection> = collections
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    // ─── Entries (current state) ─────────────────────────────────

    async fn update_entry(&self, entry: &CollectionEntry) -> Result<bool, StoreError> {
        self.check_online()?;
        check_entry_columns(entry)?;

        let mut entries = self.entries.write().await;
        match entries.get_mut(&entry.key) {
            Some(existing) => {
                // Last-write-wins by timestamp, not by arrival order.
                if entry.last_update >= existing.last_update {
                    *existing = entry.clone();
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_entry(&self, entry: &CollectionEntry) -> Result<WriteOutcome, StoreError> {
        self.check_online()?;
        check_entry_columns(entry)?;

        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.key) {
            return Ok(WriteOutcome::Conflict);
        }
        entries.insert(entry.key.clone(), entry.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn fetch_entries(
        &self,
        owner: &str,
        collection: &str,
    ) -> Result<Vec<CollectionEntry>, StoreError> {
        self.check_online()?;
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|e| e.key.owner == owner && e.key.collection == collection)
            .cloned()
            .collect())
    }

    // ─── History (append-only) ───────────────────────────────────

    async fn append_history(&self, row: &HistoryEntry) -> Result<(), StoreError> {
        self.check_online()?;
        check_column("comment", &row.comment)?;

        let mut history = self.history.write().await;
        let rows = history
            .entry((row.key.owner.clone(), row.key.collection.clone()))
            .or_default();

        // Uniqueness key includes the timestamp: re-appending the same
        // (identity, timestamp) row is idempotent, not a duplicate.
        if let Some(existing) = rows
            .iter_mut()
            .find(|r| r.key == row.key && r.timestamp == row.timestamp)
        {
            *existing = row.clone();
        } else {
            rows.push(row.clone());
        }
        Ok(())
    }

    async fn fetch_history(
        &self,
        owner: &str,
        collection: &str,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        self.check_online()?;
        let history = self.history.read().await;
        Ok(history
            .get(&(owner.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
