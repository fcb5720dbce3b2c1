//! Boundary layer for the roach race escrow.
//!
//! Authenticates callers with JWT bearer tokens and forwards every request
//! to the escrow actor through an [`roach_race::EscrowHandle`].

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
