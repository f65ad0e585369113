// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod credentials;
pub mod directory;
pub mod entries;
pub mod password;

pub use credentials::CredentialService;
pub use directory::UserDirectory;
pub use entries::{latest_at_or_before, EntryStore};
