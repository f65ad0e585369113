// SPDX-License-Identifier: MIT

//! Collection metadata: ownership and public-visibility permissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How much of a collection is visible without authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    /// Nothing visible publicly
    Private,
    /// Current contents visible, history hidden
    Contents,
    /// History visible as well
    History,
}

/// A named collection of card entries, unique per (name, owner).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    /// Owning user, referenced by name
    pub owner: String,
    pub privacy: Privacy,
    /// Whether unauthenticated viewers may see current contents
    pub public_viewing: bool,
    /// Whether unauthenticated viewers may see the change history
    pub public_history: bool,
    /// Whether entry comments are included in public views
    pub public_comments: bool,
    pub last_update: DateTime<Utc>,
}

impl Collection {
    /// A freshly created, fully private collection.
    pub fn new(name: String, owner: String, now: DateTime<Utc>) -> Self {
        Self {
            name,
            owner,
            privacy: Privacy::Private,
            public_viewing: false,
            public_history: false,
            public_comments: false,
            last_update: now,
        }
    }
}
