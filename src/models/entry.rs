// SPDX-License-Identifier: MIT

//! Collection entries, their composite identity key, and the history rows
//! the ledger appends for every accepted change.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Physical card condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    /// Near mint
    NM,
    /// Lightly played
    LP,
    /// Heavily played
    HP,
}

impl FromStr for Quality {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NM" => Ok(Quality::NM),
            "LP" => Ok(Quality::LP),
            "HP" => Ok(Quality::HP),
            other => Err(AppError::InvalidField(format!("unknown quality {other:?}"))),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quality::NM => "NM",
            Quality::LP => "LP",
            Quality::HP => "HP",
        })
    }
}

/// Print language of a card, from the fixed ISO-639-1-derived set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    EN,
    ZhHans,
    ZhHant,
    FR,
    IT,
    DE,
    KO,
    JA,
    PT,
    RU,
    ES,
}

impl FromStr for Language {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EN" => Ok(Language::EN),
            "ZH-HANS" => Ok(Language::ZhHans),
            "ZH-HANT" => Ok(Language::ZhHant),
            "FR" => Ok(Language::FR),
            "IT" => Ok(Language::IT),
            "DE" => Ok(Language::DE),
            "KO" => Ok(Language::KO),
            "JA" => Ok(Language::JA),
            "PT" => Ok(Language::PT),
            "RU" => Ok(Language::RU),
            "ES" => Ok(Language::ES),
            other => Err(AppError::InvalidField(format!("unknown language {other:?}"))),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::EN => "EN",
            Language::ZhHans => "ZH-HANS",
            Language::ZhHant => "ZH-HANT",
            Language::FR => "FR",
            Language::IT => "IT",
            Language::DE => "DE",
            Language::KO => "KO",
            Language::JA => "JA",
            Language::PT => "PT",
            Language::RU => "RU",
            Language::ES => "ES",
        })
    }
}

/// The composite identity of a collection entry.
///
/// At most one current entry row may exist per key; this is the central
/// uniqueness invariant the content store enforces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    pub owner: String,
    pub collection: String,
    pub card_name: String,
    pub set_name: String,
    pub quality: Quality,
    pub language: Language,
}

/// Current state of one entry, exactly one row per [`EntryKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub key: EntryKey,
    pub quantity: i64,
    pub comment: String,
    pub last_update: DateTime<Utc>,
}

/// One accepted mutation, as recorded in the append-only ledger.
///
/// Same attribute shape as [`CollectionEntry`], but the timestamp is part of
/// the uniqueness key, so the same entry appears once per accepted change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub key: EntryKey,
    pub quantity: i64,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// The entry state this history row records.
    pub fn as_entry(&self) -> CollectionEntry {
        CollectionEntry {
            key: self.key.clone(),
            quantity: self.quantity,
            comment: self.comment.clone(),
            last_update: self.timestamp,
        }
    }
}

/// Caller input for one `apply_entry` call, validated before any write.
///
/// The length bounds mirror [`crate::models::FIELD_LIMIT`].
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct NewEntry {
    #[validate(length(min = 1, max = 280))]
    pub owner: String,
    #[validate(length(min = 1, max = 280))]
    pub collection: String,
    #[validate(length(min = 1, max = 280))]
    pub card_name: String,
    #[validate(length(min = 1, max = 280))]
    pub set_name: String,
    #[validate(length(max = 280))]
    pub comment: String,
    pub quantity: i64,
    pub quality: Quality,
    pub language: Language,
    pub timestamp: DateTime<Utc>,
}

impl NewEntry {
    /// The identity key this input targets.
    pub fn key(&self) -> EntryKey {
        EntryKey {
            owner: self.owner.clone(),
            collection: self.collection.clone(),
            card_name: self.card_name.clone(),
            set_name: self.set_name.clone(),
            quality: self.quality,
            language: self.language,
        }
    }

    /// The current-state row this input produces once accepted.
    pub fn as_entry(&self) -> CollectionEntry {
        CollectionEntry {
            key: self.key(),
            quantity: self.quantity,
            comment: self.comment.clone(),
            last_update: self.timestamp,
        }
    }

    /// The ledger row this input produces once accepted.
    pub fn as_history(&self) -> HistoryEntry {
        HistoryEntry {
            key: self.key(),
            quantity: self.quantity,
            comment: self.comment.clone(),
            timestamp: self.timestamp,
        }
    }
}
