//! Race registry: id allocation and race storage.

use super::models::{Amount, MAX_PLAYERS, MIN_PLAYERS, Race, RaceId, RaceStage, RaceView};
use crate::{
    admin::MAX_FEE_PERCENT,
    errors::{EscrowError, EscrowResult},
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Owns every race ever created, keyed by sequential id
#[derive(Debug)]
pub struct RaceRegistry {
    races: BTreeMap<RaceId, Race>,
    next_race_id: RaceId,
}

impl Default for RaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RaceRegistry {
    pub fn new() -> Self {
        Self {
            races: BTreeMap::new(),
            next_race_id: 1,
        }
    }

    /// Check creation parameters without touching the registry
    pub fn validate_params(entry_fee: Amount, max_players: usize) -> EscrowResult<()> {
        if entry_fee == 0 {
            return Err(EscrowError::InvalidParameter(
                "Entry fee must be greater than 0".to_string(),
            ));
        }

        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
            return Err(EscrowError::InvalidParameter(format!(
                "Max players must be between {MIN_PLAYERS} and {MAX_PLAYERS}"
            )));
        }

        // A full pot must still admit the largest fee computation
        let max_pot_fee = entry_fee
            .checked_mul(max_players as Amount)
            .and_then(|pot| pot.checked_mul(Amount::from(MAX_FEE_PERCENT)));
        if max_pot_fee.is_none() {
            return Err(EscrowError::InvalidParameter(
                "Entry fee too large".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a race and return its id
    ///
    /// # Errors
    ///
    /// * `EscrowError::InvalidParameter` - zero entry fee or player cap outside [2, 10]
    pub fn create(
        &mut self,
        entry_fee: Amount,
        max_players: usize,
        now: DateTime<Utc>,
    ) -> EscrowResult<RaceId> {
        Self::validate_params(entry_fee, max_players)?;

        let race_id = self.next_race_id;
        let next = race_id
            .checked_add(1)
            .ok_or_else(|| EscrowError::Overflow("race id space exhausted".to_string()))?;

        self.races
            .insert(race_id, Race::new(race_id, entry_fee, max_players, now));
        self.next_race_id = next;

        Ok(race_id)
    }

    pub fn get(&self, race_id: RaceId) -> EscrowResult<&Race> {
        self.races
            .get(&race_id)
            .ok_or(EscrowError::RaceNotFound(race_id))
    }

    pub(crate) fn get_mut(&mut self, race_id: RaceId) -> EscrowResult<&mut Race> {
        self.races
            .get_mut(&race_id)
            .ok_or(EscrowError::RaceNotFound(race_id))
    }

    /// List races in id order, optionally restricted to one stage
    pub fn list(&self, stage: Option<RaceStage>) -> Vec<RaceView> {
        self.races
            .values()
            .filter(|race| stage.is_none_or(|s| race.stage() == s))
            .map(Race::view)
            .collect()
    }

    /// Number of races ever created
    pub fn race_count(&self) -> u64 {
        self.next_race_id - 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Race> {
        self.races.values()
    }
}
