//! Outbound value transfer seam.
//!
//! The ledger never moves value itself; it hands each withdrawal to a
//! [`PayoutSink`] after the caller's balance has already been zeroed.

use crate::race::models::{Amount, Identity, amount_string};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Transfer rejected by the payout backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct PayoutError(pub String);

/// Performs the external transfer for a withdrawal.
///
/// Called synchronously inside the withdraw operation. Returning an error
/// rolls the withdrawal back.
pub trait PayoutSink: Send {
    fn transfer(&mut self, to: &Identity, amount: Amount) -> Result<(), PayoutError>;
}

impl<F> PayoutSink for F
where
    F: FnMut(&Identity, Amount) -> Result<(), PayoutError> + Send,
{
    fn transfer(&mut self, to: &Identity, amount: Amount) -> Result<(), PayoutError> {
        self(to, amount)
    }
}

/// A completed outbound transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub to: Identity,
    #[serde(with = "amount_string")]
    pub amount: Amount,
    pub at: DateTime<Utc>,
}

/// Sink that records every transfer in a shared outbox for the boundary
/// layer to settle.
#[derive(Debug, Clone, Default)]
pub struct OutboxPayout {
    outbox: Arc<Mutex<Vec<Transfer>>>,
}

impl OutboxPayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all transfers recorded so far
    pub fn transfers(&self) -> Vec<Transfer> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    /// Take every transfer recorded since the last drain, leaving the
    /// outbox empty.
    pub fn drain(&self) -> Vec<Transfer> {
        self.outbox
            .lock()
            .map(|mut outbox| std::mem::take(&mut *outbox))
            .unwrap_or_default()
    }

    /// Total value sent to one identity
    pub fn total_sent_to(&self, identity: &Identity) -> Amount {
        self.transfers()
            .iter()
            .filter(|t| &t.to == identity)
            .map(|t| t.amount)
            .sum()
    }
}

impl PayoutSink for OutboxPayout {
    fn transfer(&mut self, to: &Identity, amount: Amount) -> Result<(), PayoutError> {
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| PayoutError("payout outbox poisoned".to_string()))?;
        outbox.push(Transfer {
            to: to.clone(),
            amount,
            at: Utc::now(),
        });
        log::info!("Payout of {} queued for {}", amount, to);
        Ok(())
    }
}
