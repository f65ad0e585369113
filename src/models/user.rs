// SPDX-License-Identifier: MIT

//! User identity model.

use serde::{Deserialize, Serialize};

/// A registered user as stored durably and cached by the directory.
///
/// Users are identified by name; collections reference their owner by name
/// rather than by a managed pointer. Users are never hard-deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user name (bounded by [`crate::models::FIELD_LIMIT`])
    pub name: String,
    /// Unique email address
    pub email: String,
    /// PBKDF2-derived password hash
    pub password_hash: Vec<u8>,
    /// Per-user random salt used for the derivation
    pub salt: Vec<u8>,
    /// How many collections this user may own
    pub max_collections: usize,
    /// When the user registered (RFC 3339)
    pub created_at: String,
}
