//! Race lifecycle state machine.
//!
//! Open → Started → Finalized. Every transition is split into a `check_*`
//! function that validates against a shared borrow and an `apply_*` function
//! that mutates. Callers must run the check first and only apply on success,
//! so a failed operation never leaves a partial write behind.

use super::models::{Amount, CockroachId, Identity, MIN_PLAYERS, Race};
use crate::errors::{EscrowError, EscrowResult};
use chrono::{DateTime, Utc};

/// Validate a join. Preconditions are checked in a fixed order and the
/// first failure wins.
pub fn check_join(race: &Race, caller: &Identity, stake: Amount) -> EscrowResult<Amount> {
    if race.started {
        return Err(EscrowError::InvalidState {
            race_id: race.id,
            stage: race.stage().to_string(),
            operation: "join",
        });
    }

    if stake != race.entry_fee {
        return Err(EscrowError::PaymentMismatch {
            expected: race.entry_fee,
            got: stake,
        });
    }

    if race.has_player(caller) {
        return Err(EscrowError::DuplicateJoin(caller.clone(), race.id));
    }

    if race.current_players() >= race.max_players {
        return Err(EscrowError::RaceFull {
            race_id: race.id,
            max_players: race.max_players,
        });
    }

    race.total_pot
        .checked_add(race.entry_fee)
        .ok_or_else(|| EscrowError::Overflow(format!("pot of race {}", race.id)))
}

/// Append the caller and their stake. `new_pot` comes from `check_join`.
pub fn apply_join(race: &mut Race, caller: Identity, cockroach_id: CockroachId, new_pot: Amount) {
    race.players.push(caller);
    race.cockroach_ids.push(cockroach_id);
    race.total_pot = new_pot;
}

pub fn check_start(race: &Race) -> EscrowResult<()> {
    if race.started {
        return Err(EscrowError::InvalidState {
            race_id: race.id,
            stage: race.stage().to_string(),
            operation: "start",
        });
    }

    if race.current_players() < MIN_PLAYERS {
        return Err(EscrowError::NotEnoughPlayers {
            race_id: race.id,
            players: race.current_players(),
            required: MIN_PLAYERS,
        });
    }

    Ok(())
}

/// Lock the race. Returns the recorded start time.
pub fn apply_start(race: &mut Race, now: DateTime<Utc>) -> DateTime<Utc> {
    let at = now.max(race.last_timestamp());
    race.started = true;
    race.started_at = Some(at);
    at
}

/// Validate a finalize and return the winning identity
pub fn check_finalize(race: &Race, winner_index: usize) -> EscrowResult<Identity> {
    if !race.started {
        return Err(EscrowError::InvalidState {
            race_id: race.id,
            stage: race.stage().to_string(),
            operation: "finalize",
        });
    }

    if race.finalized {
        return Err(EscrowError::AlreadyFinalized(race.id));
    }

    race.players
        .get(winner_index)
        .cloned()
        .ok_or(EscrowError::InvalidWinner {
            index: winner_index,
            players: race.current_players(),
        })
}

/// Mark the race finalized. Returns the recorded finalize time.
pub fn apply_finalize(race: &mut Race, winner_index: usize, now: DateTime<Utc>) -> DateTime<Utc> {
    let at = now.max(race.last_timestamp());
    race.finalized = true;
    race.winner = Some(winner_index);
    race.finalized_at = Some(at);
    at
}
