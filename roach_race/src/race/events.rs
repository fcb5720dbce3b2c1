//! Events emitted by successful escrow operations.

use super::models::{Amount, CockroachId, Identity, RaceId, amount_string};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Escrow event, published to subscribers after the operation commits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RaceEvent {
    RaceCreated {
        race_id: RaceId,
        #[serde(with = "amount_string")]
        entry_fee: Amount,
        max_players: usize,
        at: DateTime<Utc>,
    },
    RaceJoined {
        race_id: RaceId,
        player: Identity,
        cockroach_id: CockroachId,
        current_players: usize,
        #[serde(with = "amount_string")]
        total_pot: Amount,
        at: DateTime<Utc>,
    },
    RaceStarted {
        race_id: RaceId,
        players: Vec<Identity>,
        #[serde(with = "amount_string")]
        total_pot: Amount,
        at: DateTime<Utc>,
    },
    RaceFinalized {
        race_id: RaceId,
        winner_index: usize,
        winner: Identity,
        #[serde(with = "amount_string")]
        winner_share: Amount,
        fee_collector: Identity,
        #[serde(with = "amount_string")]
        fee_share: Amount,
        at: DateTime<Utc>,
    },
    Withdrawn {
        identity: Identity,
        #[serde(with = "amount_string")]
        amount: Amount,
        at: DateTime<Utc>,
    },
    PlatformFeeUpdated {
        percent: u8,
        at: DateTime<Utc>,
    },
    FeeCollectorUpdated {
        fee_collector: Identity,
        at: DateTime<Utc>,
    },
    OperatorUpdated {
        operator: Identity,
        enabled: bool,
        at: DateTime<Utc>,
    },
}

impl RaceEvent {
    /// Race the event belongs to, if any
    pub fn race_id(&self) -> Option<RaceId> {
        match self {
            RaceEvent::RaceCreated { race_id, .. }
            | RaceEvent::RaceJoined { race_id, .. }
            | RaceEvent::RaceStarted { race_id, .. }
            | RaceEvent::RaceFinalized { race_id, .. } => Some(*race_id),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for RaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceEvent::RaceCreated {
                race_id,
                entry_fee,
                max_players,
                ..
            } => write!(
                f,
                "race {race_id} created (entry fee {entry_fee}, max {max_players} players)"
            ),
            RaceEvent::RaceJoined {
                race_id, player, ..
            } => write!(f, "{player} joined race {race_id}"),
            RaceEvent::RaceStarted { race_id, .. } => write!(f, "race {race_id} started"),
            RaceEvent::RaceFinalized {
                race_id,
                winner,
                winner_share,
                ..
            } => write!(f, "race {race_id} won by {winner} ({winner_share})"),
            RaceEvent::Withdrawn {
                identity, amount, ..
            } => write!(f, "{identity} withdrew {amount}"),
            RaceEvent::PlatformFeeUpdated { percent, .. } => {
                write!(f, "platform fee set to {percent}%")
            }
            RaceEvent::FeeCollectorUpdated { fee_collector, .. } => {
                write!(f, "fee collector set to {fee_collector}")
            }
            RaceEvent::OperatorUpdated {
                operator, enabled, ..
            } => {
                if *enabled {
                    write!(f, "{operator} granted operator")
                } else {
                    write!(f, "{operator} revoked as operator")
                }
            }
        }
    }
}
