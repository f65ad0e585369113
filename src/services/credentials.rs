// SPDX-License-Identifier: MIT

//! Ephemeral credential lifecycle: login sessions and password-reset tokens.
//!
//! Issues opaque keys scoped to a user name, enforces time-window validity,
//! narrows windows on revocation, and sweeps rows whose windows have fully
//! elapsed. Independent of collection logic.

use crate::clock::Clock;
use crate::config::Config;
use crate::db::{Store, WriteOutcome};
use crate::error::{AppError, Result};
use crate::models::{check_field_length, Credential, CredentialKind};
use anyhow::anyhow;
use chrono::Duration;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

/// Opaque keys are 32 random bytes, hex-encoded.
const KEY_LEN: usize = 32;

/// A (user, key) collision is astronomically rare; a handful of retries is
/// plenty before declaring the RNG broken.
const KEY_RETRY_LIMIT: u32 = 5;

/// Issues, validates, revokes and sweeps ephemeral credentials.
pub struct CredentialService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
    reset_token_ttl: Duration,
    sweep_retention: Duration,
}

impl CredentialService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            store,
            clock,
            session_ttl: Duration::seconds(config.session_ttl_secs),
            reset_token_ttl: Duration::seconds(config.reset_token_ttl_secs),
            sweep_retention: Duration::seconds(config.sweep_retention_secs),
        }
    }

    // ─── Issuance ────────────────────────────────────────────────

    /// Issue a fresh login session for an existing user.
    pub async fn issue_session(&self, user_name: &str) -> Result<String> {
        self.issue(user_name, CredentialKind::Session, self.session_ttl)
            .await
    }

    /// Issue a fresh password-reset token for an existing user.
    ///
    /// The validity window is opened explicitly here; a token is never
    /// created already expired.
    pub async fn issue_reset_token(&self, user_name: &str) -> Result<String> {
        self.issue(user_name, CredentialKind::ResetToken, self.reset_token_ttl)
            .await
    }

    async fn issue(
        &self,
        user_name: &str,
        kind: CredentialKind,
        ttl: Duration,
    ) -> Result<String> {
        // The length check runs before any storage access; it doubles as a
        // starvation-prevention bound against abusive names.
        check_field_length("user name", user_name)?;

        if self.store.fetch_user(user_name).await?.is_none() {
            return Err(AppError::InvalidCredential);
        }

        let now = self.clock.now();
        let mut attempts = 0;
        loop {
            let key = generate_key()?;
            let cred = Credential {
                user_name: user_name.to_string(),
                key: key.clone(),
                kind,
                valid_from: now,
                valid_until: now + ttl,
            };

            match self.store.insert_credential(&cred).await? {
                WriteOutcome::Applied => {
                    tracing::debug!(user = user_name, kind = ?kind, "Credential issued");
                    return Ok(key);
                }
                WriteOutcome::Conflict => {
                    attempts += 1;
                    if attempts >= KEY_RETRY_LIMIT {
                        return Err(AppError::Internal(anyhow!(
                            "repeated credential key collisions for {user_name}"
                        )));
                    }
                    tracing::warn!(user = user_name, "Credential key collision, regenerating");
                }
            }
        }
    }

    // ─── Validation ──────────────────────────────────────────────

    /// Validate a login session key.
    pub async fn validate_session(&self, user_name: &str, key: &str) -> Result<()> {
        let cred = self
            .store
            .fetch_credential(CredentialKind::Session, user_name, key)
            .await?
            .ok_or(AppError::InvalidCredential)?;

        if !cred.is_valid_at(self.clock.now()) {
            return Err(AppError::InvalidCredential);
        }
        Ok(())
    }

    /// Validate a password-reset token and consume it.
    ///
    /// Single-use: a successfully validated token is invalidated within this
    /// same call by collapsing its window, so it can never be replayed. If
    /// the collapse cannot be persisted the validation fails.
    pub async fn validate_reset_token(&self, user_name: &str, key: &str) -> Result<()> {
        let cred = self
            .store
            .fetch_credential(CredentialKind::ResetToken, user_name, key)
            .await?
            .ok_or(AppError::InvalidCredential)?;

        if !cred.is_valid_at(self.clock.now()) {
            return Err(AppError::InvalidCredential);
        }

        let collapsed = self
            .store
            .update_credential_window(
                CredentialKind::ResetToken,
                user_name,
                key,
                cred.valid_from,
                cred.valid_from,
            )
            .await?;
        if !collapsed {
            // The sweep raced us and removed the row; the token is gone
            // either way, so single-use holds.
            tracing::debug!(user = user_name, "Reset token vanished during consumption");
        }

        tracing::info!(user = user_name, "Reset token consumed");
        Ok(())
    }

    // ─── Revocation & sweep ──────────────────────────────────────

    /// Narrow a session's validity window to end now. Idempotent: revoking
    /// an already-revoked or unknown key is a no-op success.
    pub async fn revoke(&self, user_name: &str, key: &str) -> Result<()> {
        let now = self.clock.now();
        let Some(cred) = self
            .store
            .fetch_credential(CredentialKind::Session, user_name, key)
            .await?
        else {
            return Ok(());
        };

        if cred.valid_until <= now {
            return Ok(());
        }

        self.store
            .update_credential_window(CredentialKind::Session, user_name, key, cred.valid_from, now)
            .await?;

        tracing::info!(user = user_name, "Session revoked");
        Ok(())
    }

    /// Remove all sessions a user holds. Used when a password reset must
    /// cut off any holder of the old password.
    pub async fn revoke_all_sessions(&self, user_name: &str) -> Result<usize> {
        let removed = self
            .store
            .delete_credentials_for_user(CredentialKind::Session, user_name)
            .await?;
        tracing::info!(user = user_name, removed, "All sessions revoked");
        Ok(removed)
    }

    /// Delete credential rows whose windows have fully elapsed beyond the
    /// retention margin. Only removes rows that are already useless, so it
    /// is safe alongside concurrent issuance and validation.
    pub async fn sweep(&self) -> Result<usize> {
        let removed = self
            .store
            .sweep_credentials(self.clock.now(), self.sweep_retention)
            .await?;
        if removed > 0 {
            tracing::info!(removed, "Swept expired credentials");
        }
        Ok(removed)
    }
}

/// Generate an opaque credential key from the system RNG.
fn generate_key() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; KEY_LEN];
    rng.fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow!("system RNG failure")))?;
    Ok(hex::encode(bytes))
}
