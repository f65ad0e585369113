// SPDX-License-Identifier: MIT

//! Durable storage seam.
//!
//! The core talks to persistence through the [`Store`] trait: conditional
//! updates, uniqueness-constraint-enforced inserts, and append operations.
//! Conflicts are an expected, typed outcome of a write rather than an error,
//! so the upsert retry loop in the content store has a real signal to react
//! to. [`MemoryStore`] is the in-process implementation.

pub mod memory;

pub use memory::MemoryStore;

use crate::models::{Collection, CollectionEntry, Credential, CredentialKind, HistoryEntry, User};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Result of a write that is guarded by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The row was written.
    Applied,
    /// A row with the same unique key already exists; nothing was written.
    Conflict,
}

/// Errors surfaced by the storage layer itself.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend is unreachable or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A text column bound was violated. The storage layer enforces the
    /// field-length contract independently of application-level validation.
    #[error("field {0} exceeds the column bound")]
    FieldTooLong(&'static str),

    /// A uniqueness constraint was violated by a write that is not an
    /// insert (inserts report [`WriteOutcome::Conflict`] instead).
    #[error("unique {0} already taken")]
    UniqueViolation(&'static str),
}

impl From<StoreError> for crate::error::AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => crate::error::AppError::Storage(msg),
            StoreError::FieldTooLong(field) => {
                crate::error::AppError::InvalidField(format!("{field} exceeds the column bound"))
            }
            StoreError::UniqueViolation(field) => {
                crate::error::AppError::AlreadyExists(field.to_string())
            }
        }
    }
}

/// Persistence operations the core consumes.
///
/// Every method is independently atomic; no cross-call transaction is
/// offered or needed (single-entry upserts and append-only logging only).
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    /// Insert a user; `Conflict` if the name or email is already taken.
    async fn insert_user(&self, user: &User) -> Result<WriteOutcome, StoreError>;

    /// Overwrite an existing user record. Returns whether a row matched.
    async fn update_user(&self, user: &User) -> Result<bool, StoreError>;

    async fn fetch_user(&self, name: &str) -> Result<Option<User>, StoreError>;

    /// Resolve an email to the owning user name.
    async fn fetch_user_name_by_email(&self, email: &str) -> Result<Option<String>, StoreError>;

    /// All known user names, for directory warm-up.
    async fn fetch_user_names(&self) -> Result<Vec<String>, StoreError>;

    // ─── Credentials ─────────────────────────────────────────────

    /// Insert a credential row; `Conflict` if (kind, user, key) exists.
    async fn insert_credential(&self, cred: &Credential) -> Result<WriteOutcome, StoreError>;

    async fn fetch_credential(
        &self,
        kind: CredentialKind,
        user_name: &str,
        key: &str,
    ) -> Result<Option<Credential>, StoreError>;

    /// Conditionally narrow a credential's validity window. Returns whether
    /// a row matched.
    async fn update_credential_window(
        &self,
        kind: CredentialKind,
        user_name: &str,
        key: &str,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Remove every credential of `kind` held by `user_name`, returning the
    /// removed count. Used when a password reset revokes all sessions.
    async fn delete_credentials_for_user(
        &self,
        kind: CredentialKind,
        user_name: &str,
    ) -> Result<usize, StoreError>;

    /// Remove rows whose validity window has fully elapsed beyond
    /// `retention`. Safe to run concurrently with issuance and validation.
    async fn sweep_credentials(
        &self,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Result<usize, StoreError>;

    // ─── Collections ─────────────────────────────────────────────

    /// Insert collection metadata; `Conflict` if (name, owner) exists.
    async fn insert_collection(&self, collection: &Collection) -> Result<WriteOutcome, StoreError>;

    /// Overwrite collection metadata. Returns whether a row matched.
    async fn update_collection(&self, collection: &Collection) -> Result<bool, StoreError>;

    async fn fetch_collections(&self, owner: &str) -> Result<Vec<Collection>, StoreError>;

    // ─── Entries (current state) ─────────────────────────────────

    /// Conditionally update the entry matching the identity key. Returns
    /// whether a row matched.
    ///
    /// Rows never move backwards in time: when the stored row carries a
    /// newer `last_update` than the incoming one, the write is acknowledged
    /// (and the caller still ledgers it) but the stored row stays. This is
    /// what makes the final state under racing writers the one with the
    /// greatest timestamp.
    async fn update_entry(&self, entry: &CollectionEntry) -> Result<bool, StoreError>;

    /// Insert a first-time entry row; `Conflict` if the identity key exists.
    async fn insert_entry(&self, entry: &CollectionEntry) -> Result<WriteOutcome, StoreError>;

    async fn fetch_entries(
        &self,
        owner: &str,
        collection: &str,
    ) -> Result<Vec<CollectionEntry>, StoreError>;

    // ─── History (append-only) ───────────────────────────────────

    /// Append one ledger row. The only write the ledger supports; there is
    /// no update or delete entry point.
    async fn append_history(&self, row: &HistoryEntry) -> Result<(), StoreError>;

    /// All ledger rows for a collection, in append order.
    async fn fetch_history(
        &self,
        owner: &str,
        collection: &str,
    ) -> Result<Vec<HistoryEntry>, StoreError>;
}
