//! Ledger module: the only component that moves value out of the escrow.
//!
//! This module implements:
//! - Per-identity withdrawable balances credited at race finalization
//! - An append-only journal of credits and withdrawals
//! - Pull-based withdrawal that zeroes the balance before transferring
//! - The [`PayoutSink`] seam for the actual outbound transfer

pub mod manager;
pub mod models;
pub mod payout;

pub use manager::Ledger;
pub use models::{Credit, EntryDirection, EntryType, LedgerEntry};
pub use payout::{OutboxPayout, PayoutError, PayoutSink, Transfer};
