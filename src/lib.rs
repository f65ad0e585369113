// SPDX-License-Identifier: MIT

//! Cardfolio: collection version store and credential lifecycle engine.
//!
//! This crate is the core behind a collectible-card inventory service:
//! concurrency-safe upserts of collection entries, an append-only history
//! ledger that can reconstruct any past state, and the lifecycle of
//! short-lived credentials (sessions and password-reset tokens). HTTP
//! routing, mail delivery and payment plumbing live outside and consume
//! these operations.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use clock::Clock;
use config::Config;
use db::Store;
use services::{CredentialService, EntryStore, UserDirectory};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub credentials: Arc<CredentialService>,
    pub directory: Arc<UserDirectory>,
    pub entries: Arc<EntryStore>,
}

impl AppState {
    /// Wire the core services over a store and a clock.
    pub fn new(config: Config, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let credentials = Arc::new(CredentialService::new(
            store.clone(),
            clock.clone(),
            &config,
        ));
        let directory = Arc::new(UserDirectory::new(
            store.clone(),
            credentials.clone(),
            clock.clone(),
            &config,
        ));
        let entries = Arc::new(EntryStore::new(store.clone(), config.upsert_retry_budget));

        Self {
            config,
            store,
            credentials,
            directory,
            entries,
        }
    }
}
