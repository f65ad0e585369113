// SPDX-License-Identifier: MIT

use cardfolio::clock::FixedClock;
use cardfolio::config::Config;
use cardfolio::db::MemoryStore;
use cardfolio::models::{Language, NewEntry, Quality};
use cardfolio::AppState;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

/// A fully wired core over an in-memory store and a pinned clock.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
}

/// Create a test app with default config, pinned to a fixed instant.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let config = Config::default();
    let store = Arc::new(MemoryStore::new());
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    let state = Arc::new(AppState::new(config, store.clone(), clock.clone()));

    TestApp {
        state,
        store,
        clock,
    }
}

/// Register a user with a valid password; returns their first session key.
#[allow(dead_code)]
pub async fn register(app: &TestApp, name: &str, email: &str) -> String {
    app.state
        .directory
        .register_user(name, email, "correcthorse1")
        .await
        .expect("registration should succeed")
}

/// Entry input targeting (alice, binder1, card, LEA, NM, EN).
#[allow(dead_code)]
pub fn entry_input(card: &str, quantity: i64, timestamp: DateTime<Utc>) -> NewEntry {
    NewEntry {
        owner: "alice".to_string(),
        collection: "binder1".to_string(),
        card_name: card.to_string(),
        set_name: "LEA".to_string(),
        comment: String::new(),
        quantity,
        quality: Quality::NM,
        language: Language::EN,
        timestamp,
    }
}
