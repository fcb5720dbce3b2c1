//! Escrow configuration.

use crate::{
    admin::{DEFAULT_FEE_PERCENT, MAX_FEE_PERCENT},
    race::models::Identity,
};
use serde::{Deserialize, Serialize};

/// Escrow configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Owner identity; the only one allowed to change policy
    pub owner: Identity,

    /// Fee collector (default: the owner)
    pub fee_collector: Option<Identity>,

    /// Platform fee in percent (default: 5, max: 20)
    pub platform_fee_percent: u8,

    /// Identities allowed to finalize races besides the owner
    pub operators: Vec<Identity>,

    /// Sequencer inbox capacity
    pub inbox_capacity: usize,

    /// Per-subscriber event buffer
    pub subscriber_capacity: usize,
}

impl EscrowConfig {
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            fee_collector: None,
            platform_fee_percent: DEFAULT_FEE_PERCENT,
            operators: Vec::new(),
            inbox_capacity: 100,
            subscriber_capacity: 32,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.owner.is_empty() {
            return Err("Owner identity must not be empty".to_string());
        }

        if self.fee_collector.as_ref().is_some_and(Identity::is_empty) {
            return Err("Fee collector identity must not be empty".to_string());
        }

        if self.platform_fee_percent > MAX_FEE_PERCENT {
            return Err(format!(
                "Platform fee must be between 0 and {MAX_FEE_PERCENT} percent"
            ));
        }

        if self.inbox_capacity == 0 || self.subscriber_capacity == 0 {
            return Err("Channel capacities must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Effective fee collector
    pub fn fee_collector(&self) -> &Identity {
        self.fee_collector.as_ref().unwrap_or(&self.owner)
    }
}
