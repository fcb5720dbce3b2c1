//! Race data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Race ID type
pub type RaceId = u64;

/// Token amount in the smallest unit (e.g. wei)
pub type Amount = u128;

/// Caller-supplied racer tag, stored alongside each player
pub type CockroachId = u64;

/// Minimum players a race can be configured for
pub const MIN_PLAYERS: usize = 2;

/// Maximum players a race can be configured for
pub const MAX_PLAYERS: usize = 10;

/// Account identity (address). Always stored lowercase so that
/// checksummed and plain spellings of the same address compare equal.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(s: &str) -> Self {
        Self(s.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

/// Position of a race in its one-way lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceStage {
    Open,
    Started,
    Finalized,
}

impl fmt::Display for RaceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceStage::Open => write!(f, "open"),
            RaceStage::Started => write!(f, "started"),
            RaceStage::Finalized => write!(f, "finalized"),
        }
    }
}

impl std::str::FromStr for RaceStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(RaceStage::Open),
            "started" => Ok(RaceStage::Started),
            "finalized" => Ok(RaceStage::Finalized),
            other => Err(format!("unknown race stage '{other}'")),
        }
    }
}

/// Race record. Created by the registry and mutated only through the
/// lifecycle transitions; never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Race {
    pub id: RaceId,
    pub entry_fee: Amount,
    pub max_players: usize,
    pub players: Vec<Identity>,
    pub cockroach_ids: Vec<CockroachId>,
    pub total_pot: Amount,
    pub started: bool,
    pub finalized: bool,
    pub winner: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Race {
    pub(crate) fn new(
        id: RaceId,
        entry_fee: Amount,
        max_players: usize,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            entry_fee,
            max_players,
            players: Vec::with_capacity(max_players),
            cockroach_ids: Vec::with_capacity(max_players),
            total_pot: 0,
            started: false,
            finalized: false,
            winner: None,
            created_at,
            started_at: None,
            finalized_at: None,
        }
    }

    pub fn stage(&self) -> RaceStage {
        match (self.started, self.finalized) {
            (_, true) => RaceStage::Finalized,
            (true, false) => RaceStage::Started,
            (false, false) => RaceStage::Open,
        }
    }

    pub fn current_players(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, identity: &Identity) -> bool {
        self.players.contains(identity)
    }

    /// Latest timestamp recorded on this race
    pub(crate) fn last_timestamp(&self) -> DateTime<Utc> {
        self.finalized_at
            .or(self.started_at)
            .unwrap_or(self.created_at)
    }

    pub fn view(&self) -> RaceView {
        RaceView {
            id: self.id,
            entry_fee: self.entry_fee,
            max_players: self.max_players,
            current_players: self.current_players(),
            players: self.players.clone(),
            cockroach_ids: self.cockroach_ids.clone(),
            total_pot: self.total_pot,
            stage: self.stage(),
            started: self.started,
            finalized: self.finalized,
            winner: self.winner,
            created_at: self.created_at,
            started_at: self.started_at,
            finalized_at: self.finalized_at,
        }
    }
}

/// Read model returned by `get_race` / `list_races`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceView {
    pub id: RaceId,
    #[serde(with = "amount_string")]
    pub entry_fee: Amount,
    pub max_players: usize,
    pub current_players: usize,
    pub players: Vec<Identity>,
    pub cockroach_ids: Vec<CockroachId>,
    #[serde(with = "amount_string")]
    pub total_pot: Amount,
    pub stage: RaceStage,
    pub started: bool,
    pub finalized: bool,
    pub winner: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl RaceView {
    /// Identity of the winner, once finalized
    pub fn winner_identity(&self) -> Option<&Identity> {
        self.winner.and_then(|idx| self.players.get(idx))
    }
}

/// Serializes amounts as decimal strings. JSON consumers cannot represent
/// 128-bit integers exactly.
pub mod amount_string {
    use super::Amount;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Amount, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<Amount>()
            .map_err(|e| D::Error::custom(format!("invalid amount '{s}': {e}")))
    }
}
