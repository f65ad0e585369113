// SPDX-License-Identifier: MIT

//! Ledger replay tests: every accepted change is preserved and any past
//! state is reconstructible.

use chrono::{TimeZone, Utc};

mod common;

#[tokio::test]
async fn test_two_writes_same_key_keep_both_history_rows() {
    let app = common::create_test_app();
    let t100 = Utc.timestamp_opt(100, 0).unwrap();
    let t200 = Utc.timestamp_opt(200, 0).unwrap();

    app.state
        .entries
        .apply_entry(&common::entry_input("Bolt", 4, t100))
        .await
        .unwrap();
    app.state
        .entries
        .apply_entry(&common::entry_input("Bolt", 1, t200))
        .await
        .unwrap();

    let current = app
        .state
        .entries
        .current_entries("alice", "binder1")
        .await
        .unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].quantity, 1);
    assert_eq!(current[0].last_update, t200);

    let mut quantities: Vec<i64> = app
        .state
        .entries
        .history("alice", "binder1")
        .await
        .unwrap()
        .iter()
        .map(|row| row.quantity)
        .collect();
    quantities.sort_unstable();
    assert_eq!(quantities, vec![1, 4]);
}

#[tokio::test]
async fn test_state_at_reproduces_each_submitted_timestamp() {
    let app = common::create_test_app();
    let t100 = Utc.timestamp_opt(100, 0).unwrap();
    let t150 = Utc.timestamp_opt(150, 0).unwrap();
    let t200 = Utc.timestamp_opt(200, 0).unwrap();

    app.state
        .entries
        .apply_entry(&common::entry_input("Bolt", 4, t100))
        .await
        .unwrap();
    app.state
        .entries
        .apply_entry(&common::entry_input("Shock", 2, t150))
        .await
        .unwrap();
    app.state
        .entries
        .apply_entry(&common::entry_input("Bolt", 1, t200))
        .await
        .unwrap();

    let at_100 = app
        .state
        .entries
        .state_at("alice", "binder1", t100)
        .await
        .unwrap();
    assert_eq!(at_100.len(), 1);
    assert_eq!(at_100[0].key.card_name, "Bolt");
    assert_eq!(at_100[0].quantity, 4);

    let at_150 = app
        .state
        .entries
        .state_at("alice", "binder1", t150)
        .await
        .unwrap();
    assert_eq!(at_150.len(), 2);
    let bolt = at_150.iter().find(|e| e.key.card_name == "Bolt").unwrap();
    assert_eq!(bolt.quantity, 4, "Bolt unchanged at t=150");

    let at_200 = app
        .state
        .entries
        .state_at("alice", "binder1", t200)
        .await
        .unwrap();
    let bolt = at_200.iter().find(|e| e.key.card_name == "Bolt").unwrap();
    assert_eq!(bolt.quantity, 1);
    let shock = at_200.iter().find(|e| e.key.card_name == "Shock").unwrap();
    assert_eq!(shock.quantity, 2);
}

#[tokio::test]
async fn test_state_at_matches_current_state_after_replay() {
    let app = common::create_test_app();
    let base = Utc.timestamp_opt(1_000, 0).unwrap();

    for i in 0..5 {
        app.state
            .entries
            .apply_entry(&common::entry_input(
                &format!("Card {i}"),
                i + 1,
                base + chrono::Duration::seconds(i),
            ))
            .await
            .unwrap();
    }

    let mut replayed = app
        .state
        .entries
        .state_at("alice", "binder1", base + chrono::Duration::hours(1))
        .await
        .unwrap();
    let mut current = app
        .state
        .entries
        .current_entries("alice", "binder1")
        .await
        .unwrap();

    replayed.sort_by(|a, b| a.key.card_name.cmp(&b.key.card_name));
    current.sort_by(|a, b| a.key.card_name.cmp(&b.key.card_name));
    assert_eq!(replayed, current);
}

#[tokio::test]
async fn test_invalid_enumeration_never_partially_written() {
    let app = common::create_test_app();

    // Quality and language only exist as typed enumerations; the string
    // boundary rejects anything outside the fixed sets.
    assert!("MINT".parse::<cardfolio::models::Quality>().is_err());
    assert!("XX".parse::<cardfolio::models::Language>().is_err());

    // An over-long comment is rejected before any write: no content row,
    // no ledger row.
    let mut bad = common::entry_input("Bolt", 4, Utc.timestamp_opt(100, 0).unwrap());
    bad.comment = "x".repeat(cardfolio::models::FIELD_LIMIT + 1);
    let err = app.state.entries.apply_entry(&bad).await.unwrap_err();
    assert!(matches!(err, cardfolio::error::AppError::InvalidField(_)));

    assert!(app
        .state
        .entries
        .current_entries("alice", "binder1")
        .await
        .unwrap()
        .is_empty());
    assert!(app
        .state
        .entries
        .history("alice", "binder1")
        .await
        .unwrap()
        .is_empty());
}
