//! Ledger data models.

use crate::race::models::{Amount, Identity, RaceId, amount_string};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Journal entry, appended on every balance change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub identity: Identity,
    pub race_id: Option<RaceId>,
    #[serde(with = "amount_string")]
    pub amount: Amount,
    #[serde(with = "amount_string")]
    pub balance_after: Amount,
    pub direction: EntryDirection,
    pub entry_type: EntryType,
    pub created_at: DateTime<Utc>,
}

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl std::fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryDirection::Debit => write!(f, "debit"),
            EntryDirection::Credit => write!(f, "credit"),
        }
    }
}

/// Entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Winnings,
    PlatformFee,
    Withdrawal,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Winnings => write!(f, "winnings"),
            EntryType::PlatformFee => write!(f, "platform_fee"),
            EntryType::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

/// A pending credit, applied together with its siblings or not at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub identity: Identity,
    pub amount: Amount,
    pub race_id: Option<RaceId>,
    pub entry_type: EntryType,
}
