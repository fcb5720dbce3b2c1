//! Races: data model, registry, lifecycle transitions and events.
//!
//! A race moves through three stages and never back:
//!
//! - **Open**: accepting joins, each paying exactly the entry fee
//! - **Started**: locked, waiting for a result
//! - **Finalized**: pot paid into the ledger, terminal

pub mod events;
pub mod lifecycle;
pub mod models;
pub mod registry;

pub use events::RaceEvent;
pub use models::{
    Amount, CockroachId, Identity, MAX_PLAYERS, MIN_PLAYERS, Race, RaceId, RaceStage, RaceView,
};
pub use registry::RaceRegistry;
