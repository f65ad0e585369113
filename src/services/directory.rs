// SPDX-License-Identifier: MIT

//! User directory and in-memory cache.
//!
//! Holds, per user: identity fields, the active session-key set, and the
//! owned collections with their permission flags. All mutating operations
//! are write-through: the durable store is updated before the cached
//! snapshot is replaced, so success is never reported while durable and
//! memory state disagree. When a failure lands between a durable write
//! and the cache commit, the stale cache entry is evicted instead.
//! Session-set bookkeeping is the exception to the snapshot swap; it
//! tracks keys the credential store already persisted and mutates in place.
//!
//! Locking discipline:
//! - Three shared resources: the name-indexed map, the email-indexed map,
//!   and the known-names list. Operations touching more than one acquire
//!   them in that fixed order.
//! - Per-user mutations serialize on a per-user mutex; different users
//!   never contend on the same lock.

use crate::clock::Clock;
use crate::config::Config;
use crate::db::{Store, WriteOutcome};
use crate::error::{AppError, Result};
use crate::models::{check_field_length, Collection, Privacy, User};
use crate::services::{password, CredentialService};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Cached snapshot of one user: identity, session keys, collections.
///
/// Identity and collection state is replaced wholesale after a successful
/// durable write (mutate a clone, commit on success). The session set is
/// the one exception: it mirrors keys the credential store has already
/// persisted, so it is adjusted in place without a swap.
#[derive(Debug, Clone)]
pub struct CachedUser {
    pub user: User,
    /// Keys of sessions issued through this directory. Bookkeeping mirror;
    /// the credential store stays authoritative for validity.
    pub sessions: HashSet<String>,
    pub collections: Vec<Collection>,
}

/// Directory of users, mediating every authenticated operation.
pub struct UserDirectory {
    store: Arc<dyn Store>,
    credentials: Arc<CredentialService>,
    clock: Arc<dyn Clock>,

    /// Name-indexed cache (first in the lock order)
    users: DashMap<String, CachedUser>,
    /// Email uniqueness index (second)
    emails: DashMap<String, String>,
    /// Known user names, for bookkeeping (third)
    names: RwLock<Vec<String>>,
    /// Per-user mutation locks
    user_locks: DashMap<String, Arc<Mutex<()>>>,

    default_max_collections: usize,
}

impl UserDirectory {
    pub fn new(
        store: Arc<dyn Store>,
        credentials: Arc<CredentialService>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            credentials,
            clock,
            users: DashMap::new(),
            emails: DashMap::new(),
            names: RwLock::new(Vec::new()),
            user_locks: DashMap::new(),
            default_max_collections: config.default_max_collections,
        }
    }

    /// The serialization point for all mutations on one user.
    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ─── Registration & login ────────────────────────────────────

    /// Register a new user and return their first session key.
    pub async fn register_user(&self, name: &str, email: &str, pass: &str) -> Result<String> {
        // Field bounds first, before any storage or crypto work.
        check_field_length("user name", name)?;
        check_field_length("email", email)?;
        check_field_length("password", pass)?;

        if !password::meets_requirements(pass) {
            return Err(AppError::InvalidField(
                "password must be more than 10 alphanumeric characters".to_string(),
            ));
        }

        // Cheap cache pre-checks (name map, then email map).
        if self.users.contains_key(name) {
            return Err(AppError::AlreadyExists(format!("user {name}")));
        }
        if self.emails.contains_key(email) {
            return Err(AppError::AlreadyExists(format!("email {email}")));
        }

        let (salt, password_hash) = password::derive(pass)?;
        let user = User {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            salt,
            max_collections: self.default_max_collections,
            created_at: self.clock.now().to_rfc3339(),
        };

        // The store enforces both uniqueness constraints; the cache checks
        // above only exist to fail fast.
        match self.store.insert_user(&user).await? {
            WriteOutcome::Applied => {}
            WriteOutcome::Conflict => {
                return Err(AppError::AlreadyExists(format!("user {name}")));
            }
        }

        // Durable write succeeded; now populate the cache in lock order.
        self.users.insert(
            name.to_string(),
            CachedUser {
                user,
                sessions: HashSet::new(),
                collections: Vec::new(),
            },
        );
        self.emails.insert(email.to_string(), name.to_string());
        self.names.write().await.push(name.to_string());

        tracing::info!(user = name, "User registered");

        let key = self.credentials.issue_session(name).await?;
        self.remember_session(name, &key);
        Ok(key)
    }

    /// Authenticate by password and issue a fresh session key.
    pub async fn login(&self, name: &str, pass: &str) -> Result<String> {
        check_field_length("user name", name)?;

        let cached = self
            .load(name)
            .await?
            .ok_or(AppError::InvalidCredential)?;

        if !password::verify(pass, &cached.user.salt, &cached.user.password_hash) {
            tracing::info!(user = name, "Login rejected");
            return Err(AppError::InvalidCredential);
        }

        let key = self.credentials.issue_session(name).await?;
        self.remember_session(name, &key);
        tracing::info!(user = name, "Login succeeded");
        Ok(key)
    }

    /// Revoke one session and drop it from the cached session set.
    pub async fn logout(&self, name: &str, session_key: &str) -> Result<()> {
        self.credentials.revoke(name, session_key).await?;
        if let Some(mut cached) = self.users.get_mut(name) {
            cached.sessions.remove(session_key);
        }
        Ok(())
    }

    /// Consume a reset token and set a new password.
    ///
    /// Every existing session is revoked in case the old password was
    /// compromised; the returned key is the only valid session afterwards.
    pub async fn change_password(
        &self,
        name: &str,
        reset_token: &str,
        new_password: &str,
    ) -> Result<String> {
        check_field_length("user name", name)?;
        check_field_length("password", new_password)?;
        if !password::meets_requirements(new_password) {
            return Err(AppError::InvalidField(
                "password must be more than 10 alphanumeric characters".to_string(),
            ));
        }

        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let cached = self
            .load(name)
            .await?
            .ok_or(AppError::InvalidCredential)?;

        // Validates and consumes the token in one step.
        self.credentials.validate_reset_token(name, reset_token).await?;

        let (salt, password_hash) = password::derive(new_password)?;
        let mut updated = cached.clone();
        updated.user.salt = salt;
        updated.user.password_hash = password_hash;

        if !self.store.update_user(&updated.user).await? {
            return Err(AppError::Storage(format!(
                "user {name} missing during password change"
            )));
        }

        // The durable row now holds the new hash. If anything below fails
        // the cached snapshot would keep answering for the old password, so
        // evict it on error and let the next lookup read through.
        let key = match self.rotate_sessions(name).await {
            Ok(key) => key,
            Err(err) => {
                self.users.remove(name);
                return Err(err);
            }
        };

        updated.sessions.clear();
        updated.sessions.insert(key.clone());
        self.users.insert(name.to_string(), updated);

        tracing::info!(user = name, "Password changed, prior sessions revoked");
        Ok(key)
    }

    // ─── Lookup ──────────────────────────────────────────────────

    /// Look up a user by name, reading through to the store on a cache miss.
    pub async fn lookup(&self, name: &str) -> Result<Option<User>> {
        Ok(self.load(name).await?.map(|cached| cached.user))
    }

    /// Resolve an email address to the owning user name.
    pub async fn lookup_by_email(&self, email: &str) -> Result<Option<String>> {
        if let Some(name) = self.emails.get(email) {
            return Ok(Some(name.clone()));
        }
        let found = self.store.fetch_user_name_by_email(email).await?;
        if let Some(name) = &found {
            self.emails.insert(email.to_string(), name.clone());
        }
        Ok(found)
    }

    /// Validate a session key and load the user it grants access to.
    ///
    /// This is the single gate every mutating user-facing operation passes
    /// through before touching the user's state.
    pub async fn authenticate_and_load(&self, name: &str, session_key: &str) -> Result<User> {
        self.credentials.validate_session(name, session_key).await?;

        let cached = self.load(name).await?.ok_or(AppError::InvalidCredential)?;
        self.remember_session(name, session_key);
        Ok(cached.user)
    }

    // ─── Collections ─────────────────────────────────────────────

    /// Create a new, private, empty collection for `owner`.
    pub async fn new_collection(&self, owner: &str, collection_name: &str) -> Result<()> {
        check_field_length("collection name", collection_name)?;

        let lock = self.lock_for(owner);
        let _guard = lock.lock().await;

        let cached = self
            .load(owner)
            .await?
            .ok_or(AppError::InvalidCredential)?;

        if cached.collections.len() >= cached.user.max_collections {
            return Err(AppError::TooManyCollections(cached.user.max_collections));
        }
        if cached.collections.iter().any(|c| c.name == collection_name) {
            return Err(AppError::AlreadyExists(format!(
                "collection {collection_name}"
            )));
        }

        let collection = Collection::new(
            collection_name.to_string(),
            owner.to_string(),
            self.clock.now(),
        );

        match self.store.insert_collection(&collection).await? {
            WriteOutcome::Applied => {}
            WriteOutcome::Conflict => {
                return Err(AppError::AlreadyExists(format!(
                    "collection {collection_name}"
                )));
            }
        }

        // Commit the new snapshot only after the durable write.
        let mut updated = cached.clone();
        updated.collections.push(collection);
        updated.collections.sort_by(|a, b| a.name.cmp(&b.name));
        self.users.insert(owner.to_string(), updated);

        tracing::info!(user = owner, collection = collection_name, "Collection created");
        Ok(())
    }

    /// List the owner's collections; `public_only` filters to collections
    /// visible without authentication.
    pub async fn collection_list(&self, owner: &str, public_only: bool) -> Result<Vec<String>> {
        let cached = self
            .load(owner)
            .await?
            .ok_or(AppError::InvalidCredential)?;

        Ok(cached
            .collections
            .iter()
            .filter(|c| !public_only || c.public_viewing)
            .map(|c| c.name.clone())
            .collect())
    }

    /// Update a collection's public-visibility flags. Pure metadata change,
    /// independent of content mutations.
    pub async fn set_permissions(
        &self,
        owner: &str,
        collection_name: &str,
        viewing: bool,
        history: bool,
        comments: bool,
    ) -> Result<()> {
        let lock = self.lock_for(owner);
        let _guard = lock.lock().await;

        let cached = self
            .load(owner)
            .await?
            .ok_or(AppError::InvalidCredential)?;

        let mut updated = cached.clone();
        let Some(collection) = updated
            .collections
            .iter_mut()
            .find(|c| c.name == collection_name)
        else {
            return Err(AppError::InvalidField(format!(
                "no collection named {collection_name}"
            )));
        };

        collection.public_viewing = viewing;
        collection.public_history = history;
        collection.public_comments = comments;
        collection.privacy = if history {
            Privacy::History
        } else if viewing {
            Privacy::Contents
        } else {
            Privacy::Private
        };
        collection.last_update = self.clock.now();

        if !self.store.update_collection(collection).await? {
            return Err(AppError::Storage(format!(
                "collection {collection_name} missing during permission change"
            )));
        }

        self.users.insert(owner.to_string(), updated);
        tracing::info!(
            user = owner,
            collection = collection_name,
            viewing,
            history,
            "Permissions updated"
        );
        Ok(())
    }

    /// Fetch one collection's metadata, honoring public visibility when the
    /// caller is unauthenticated.
    pub async fn collection(
        &self,
        owner: &str,
        collection_name: &str,
        public: bool,
    ) -> Result<Collection> {
        let cached = self
            .load(owner)
            .await?
            .ok_or(AppError::InvalidCredential)?;

        let found = cached
            .collections
            .iter()
            .find(|c| c.name == collection_name)
            .ok_or(AppError::InvalidCredential)?;

        if public && !found.public_viewing {
            return Err(AppError::InvalidCredential);
        }
        Ok(found.clone())
    }

    // ─── Bookkeeping ─────────────────────────────────────────────

    /// Seed the known-names list from the store at startup.
    pub async fn warm_up(&self) -> Result<usize> {
        let mut names = self.store.fetch_user_names().await?;
        names.sort();
        let count = names.len();
        *self.names.write().await = names;
        tracing::info!(count, "User directory warmed up");
        Ok(count)
    }

    /// Every user name known to this directory.
    pub async fn user_names(&self) -> Vec<String> {
        self.names.read().await.clone()
    }

    // ─── Internals ───────────────────────────────────────────────

    /// Cache-or-store load of one user's snapshot.
    async fn load(&self, name: &str) -> Result<Option<CachedUser>> {
        if let Some(cached) = self.users.get(name) {
            return Ok(Some(cached.clone()));
        }

        let Some(user) = self.store.fetch_user(name).await? else {
            return Ok(None);
        };
        let collections = self.store.fetch_collections(name).await?;

        let cached = CachedUser {
            user,
            sessions: HashSet::new(),
            collections,
        };
        self.users.insert(name.to_string(), cached.clone());
        Ok(Some(cached))
    }

    /// Revoke every existing session and issue a single fresh one.
    async fn rotate_sessions(&self, name: &str) -> Result<String> {
        self.credentials.revoke_all_sessions(name).await?;
        self.credentials.issue_session(name).await
    }

    fn remember_session(&self, name: &str, key: &str) {
        if let Some(mut cached) = self.users.get_mut(name) {
            cached.sessions.insert(key.to_string());
        }
    }
}
