// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod collection;
pub mod credential;
pub mod entry;
pub mod user;

pub use collection::{Collection, Privacy};
pub use credential::{Credential, CredentialKind};
pub use entry::{CollectionEntry, EntryKey, HistoryEntry, Language, NewEntry, Quality};
pub use user::User;

/// Maximum length, in characters, of any free-text field persisted by the
/// core (names, emails, comments). Enforced at the storage boundary as well
/// as at input validation; it doubles as a starvation-prevention bound on
/// abusive inputs.
pub const FIELD_LIMIT: usize = 280;

/// Check a text field against [`FIELD_LIMIT`], naming the field on failure.
pub fn check_field_length(field: &'static str, value: &str) -> crate::error::Result<()> {
    if value.chars().count() > FIELD_LIMIT {
        return Err(crate::error::AppError::InvalidField(format!(
            "{field} exceeds {FIELD_LIMIT} characters"
        )));
    }
    Ok(())
}
