//! # Roach Race
//!
//! Escrow for staked cockroach races. Players join a race by paying its
//! exact entry fee into a shared pot; once the race is finalized the pot is
//! split between the winner and the platform fee collector and credited to
//! a pull-payment ledger, from which each identity withdraws its own
//! balance.
//!
//! ## Race lifecycle
//!
//! - **Open**: accepting joins until `max_players` is reached
//! - **Started**: locked, at least two players
//! - **Finalized**: pot credited, terminal
//!
//! ## Core Modules
//!
//! - [`race`]: race records, registry, lifecycle transitions and events
//! - [`ledger`]: balances, journal and the payout seam
//! - [`admin`]: fee percentage, fee collector and operators
//! - [`escrow`]: the aggregate state and its actor
//!
//! ## Example
//!
//! ```
//! use roach_race::{EscrowConfig, EscrowState, Identity, OutboxPayout};
//!
//! let owner = Identity::new("0xowner");
//! let mut escrow = EscrowState::new(&EscrowConfig::new(owner.clone())).unwrap();
//!
//! let race_id = escrow.create_race(100, 2, &owner).unwrap();
//! escrow.join_race(race_id, 7, 100, &Identity::new("0xa")).unwrap();
//! escrow.join_race(race_id, 9, 100, &Identity::new("0xb")).unwrap();
//! escrow.start_race(race_id, &owner).unwrap();
//!
//! let settlement = escrow.finalize_race(race_id, 0, &owner).unwrap();
//! assert_eq!(settlement.winner_share, 190);
//! assert_eq!(settlement.fee_share, 10);
//!
//! let mut outbox = OutboxPayout::new();
//! assert_eq!(escrow.withdraw(&Identity::new("0xa"), &mut outbox), Ok(190));
//! ```

/// Platform fee policy and authority.
pub mod admin;
pub use admin::{AdminPolicy, DEFAULT_FEE_PERCENT, MAX_FEE_PERCENT};

pub mod errors;
pub use errors::{EscrowError, EscrowResult};

/// Escrow state and actor.
pub mod escrow;
pub use escrow::{
    Clock, EscrowActor, EscrowConfig, EscrowHandle, EscrowMessage, EscrowState, Holdings,
    Settlement, SystemClock,
};

/// Pull-payment ledger.
pub mod ledger;
pub use ledger::{Ledger, LedgerEntry, OutboxPayout, PayoutError, PayoutSink, Transfer};

/// Race data and lifecycle.
pub mod race;
pub use race::{
    Amount, CockroachId, Identity, MAX_PLAYERS, MIN_PLAYERS, RaceEvent, RaceId, RaceStage,
    RaceView,
};
