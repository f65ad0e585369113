// SPDX-License-Identifier: MIT

//! Collection content store and history ledger.
//!
//! `apply_entry` is the heart of the core: an optimistic upsert with a
//! bounded retry loop, delegating race detection to the storage layer's
//! uniqueness constraint instead of taking an application-level lock.
//! Every accepted call appends exactly one ledger row, and `state_at`
//! reconstructs any past state by replaying the ledger.

use crate::db::{Store, WriteOutcome};
use crate::error::{AppError, Result};
use crate::models::{CollectionEntry, EntryKey, HistoryEntry, NewEntry};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

/// Applies entry changes and replays the append-only ledger.
pub struct EntryStore {
    store: Arc<dyn Store>,
    retry_budget: u32,
}

impl EntryStore {
    pub fn new(store: Arc<dyn Store>, retry_budget: u32) -> Self {
        Self {
            store,
            retry_budget,
        }
    }

    /// Apply one change to a collection entry.
    ///
    /// After a successful return the entry with the input's identity key
    /// holds exactly the given comment/quantity/timestamp, and exactly one
    /// history row for that key at that timestamp has been appended. Safe
    /// under concurrent callers racing to create the same identity key.
    pub async fn apply_entry(&self, input: &NewEntry) -> Result<()> {
        // Full validation before the loop; a violation performs no write.
        input
            .validate()
            .map_err(|e| AppError::InvalidField(e.to_string()))?;

        let entry = input.as_entry();
        let mut attempts = 0;

        loop {
            // Common case first: the row already exists.
            if self.store.update_entry(&entry).await? {
                return self.append_history(input).await;
            }

            // First write for this identity key. The storage uniqueness
            // constraint decides the winner if several callers race here.
            match self.store.insert_entry(&entry).await? {
                WriteOutcome::Applied => return self.append_history(input).await,
                WriteOutcome::Conflict => {
                    attempts += 1;
                    if attempts >= self.retry_budget {
                        tracing::warn!(
                            owner = %entry.key.owner,
                            collection = %entry.key.collection,
                            card = %entry.key.card_name,
                            attempts,
                            "Upsert retry budget exhausted"
                        );
                        return Err(AppError::Contention(format!(
                            "entry {}/{}",
                            entry.key.collection, entry.key.card_name
                        )));
                    }
                    tracing::debug!(
                        owner = %entry.key.owner,
                        card = %entry.key.card_name,
                        "Lost first-insert race, retrying as update"
                    );
                }
            }
        }
    }

    /// Append the ledger row for an accepted content write. Runs exactly
    /// once per accepted call, after the content write it corresponds to.
    async fn append_history(&self, input: &NewEntry) -> Result<()> {
        self.store.append_history(&input.as_history()).await?;
        tracing::debug!(
            owner = %input.owner,
            collection = %input.collection,
            card = %input.card_name,
            quantity = input.quantity,
            "Entry applied"
        );
        Ok(())
    }

    /// Current contents of a collection.
    pub async fn current_entries(
        &self,
        owner: &str,
        collection: &str,
    ) -> Result<Vec<CollectionEntry>> {
        Ok(self.store.fetch_entries(owner, collection).await?)
    }

    /// Reconstruct the state of a collection at time `at` from the ledger.
    pub async fn state_at(
        &self,
        owner: &str,
        collection: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<CollectionEntry>> {
        let rows = self.store.fetch_history(owner, collection).await?;
        Ok(latest_at_or_before(&rows, at))
    }

    /// The full ledger for a collection, in append order.
    pub async fn history(&self, owner: &str, collection: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self.store.fetch_history(owner, collection).await?)
    }
}

/// Latest-by-key-at-or-before-T reduction over ledger rows.
///
/// Groups rows by identity key and keeps, per group, the row with the
/// greatest timestamp not exceeding `at`. Zero-quantity rows are reported
/// like any other state; the ledger has no delete path.
pub fn latest_at_or_before(rows: &[HistoryEntry], at: DateTime<Utc>) -> Vec<CollectionEntry> {
    let mut latest: HashMap<&EntryKey, &HistoryEntry> = HashMap::new();

    for row in rows.iter().filter(|r| r.timestamp <= at) {
        match latest.get(&row.key) {
            Some(current) if current.timestamp >= row.timestamp => {}
            _ => {
                latest.insert(&row.key, row);
            }
        }
    }

    latest.into_values().map(HistoryEntry::as_entry).collect()
}
