// SPDX-License-Identifier: MIT

//! Ephemeral credential rows (login sessions and password-reset tokens).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which lifecycle a credential row follows.
///
/// Sessions are revocable and long-lived; reset tokens are short-lived and
/// single-use. The (user, key) pair is unique per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Session,
    ResetToken,
}

/// An ephemeral credential scoped to a user name.
///
/// Valid iff `valid_from <= now < valid_until`. Revocation narrows the
/// window rather than deleting the row; the periodic sweep removes rows
/// whose window has fully elapsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub user_name: String,
    /// Opaque key handed to the caller (32 random bytes, hex-encoded)
    pub key: String,
    pub kind: CredentialKind,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl Credential {
    /// Whether the credential is inside its validity window at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now < self.valid_until
    }

    /// Whether the row is dead weight the sweep may remove: the window is
    /// collapsed, or elapsed beyond the retention margin.
    pub fn is_sweepable(&self, now: DateTime<Utc>, retention: chrono::Duration) -> bool {
        self.valid_until <= self.valid_from || self.valid_until + retention <= now
    }
}
