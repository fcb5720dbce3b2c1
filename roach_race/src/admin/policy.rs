//! Owner-controlled platform policy.

use crate::{
    errors::{EscrowError, EscrowResult},
    race::models::{Amount, Identity},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Highest platform fee the owner may configure, in percent
pub const MAX_FEE_PERCENT: u8 = 20;

/// Platform fee applied when none is configured, in percent
pub const DEFAULT_FEE_PERCENT: u8 = 5;

/// Fee configuration and finalization authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPolicy {
    owner: Identity,
    fee_collector: Identity,
    fee_percent: u8,
    operators: BTreeSet<Identity>,
}

impl AdminPolicy {
    /// New policy with the owner collecting a 5% fee
    pub fn new(owner: Identity) -> Self {
        Self {
            fee_collector: owner.clone(),
            owner,
            fee_percent: DEFAULT_FEE_PERCENT,
            operators: BTreeSet::new(),
        }
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn fee_collector(&self) -> &Identity {
        &self.fee_collector
    }

    pub fn fee_percent(&self) -> u8 {
        self.fee_percent
    }

    pub fn operators(&self) -> impl Iterator<Item = &Identity> {
        self.operators.iter()
    }

    pub fn is_owner(&self, identity: &Identity) -> bool {
        &self.owner == identity
    }

    /// Owner or a registered operator
    pub fn can_finalize(&self, identity: &Identity) -> bool {
        self.is_owner(identity) || self.operators.contains(identity)
    }

    fn require_owner(&self, caller: &Identity, operation: &'static str) -> EscrowResult<()> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(EscrowError::Unauthorized {
                caller: caller.clone(),
                operation,
            })
        }
    }

    pub fn require_finalizer(&self, caller: &Identity) -> EscrowResult<()> {
        if self.can_finalize(caller) {
            Ok(())
        } else {
            Err(EscrowError::Unauthorized {
                caller: caller.clone(),
                operation: "finalize races",
            })
        }
    }

    /// # Errors
    ///
    /// * `EscrowError::Unauthorized` - caller is not the owner
    /// * `EscrowError::FeeTooHigh` - `percent` above [`MAX_FEE_PERCENT`]
    pub fn set_platform_fee(&mut self, percent: u16, caller: &Identity) -> EscrowResult<()> {
        self.require_owner(caller, "set the platform fee")?;
        self.fee_percent = check_fee_percent(percent)?;
        Ok(())
    }

    pub fn set_fee_collector(&mut self, collector: Identity, caller: &Identity) -> EscrowResult<()> {
        self.require_owner(caller, "set the fee collector")?;
        if collector.is_empty() {
            return Err(EscrowError::InvalidParameter(
                "Fee collector must not be empty".to_string(),
            ));
        }
        self.fee_collector = collector;
        Ok(())
    }

    pub fn set_operator(
        &mut self,
        operator: Identity,
        enabled: bool,
        caller: &Identity,
    ) -> EscrowResult<()> {
        self.require_owner(caller, "manage operators")?;
        if enabled {
            self.operators.insert(operator);
        } else {
            self.operators.remove(&operator);
        }
        Ok(())
    }

    /// Split a pot into `(fee_share, winner_share)`.
    ///
    /// The fee truncates; the winner gets the rest, so the two shares always
    /// sum to `total_pot`.
    pub fn fee_split(&self, total_pot: Amount) -> EscrowResult<(Amount, Amount)> {
        fee_split(total_pot, self.fee_percent)
    }
}

/// Narrow a requested fee to the stored percent, rejecting anything above
/// [`MAX_FEE_PERCENT`].
pub fn check_fee_percent(percent: u16) -> EscrowResult<u8> {
    match u8::try_from(percent) {
        Ok(percent) if percent <= MAX_FEE_PERCENT => Ok(percent),
        _ => Err(EscrowError::FeeTooHigh {
            requested: percent,
            max: MAX_FEE_PERCENT,
        }),
    }
}

pub fn fee_split(total_pot: Amount, fee_percent: u8) -> EscrowResult<(Amount, Amount)> {
    let fee_share = total_pot
        .checked_mul(Amount::from(fee_percent))
        .ok_or_else(|| EscrowError::Overflow(format!("fee on pot {total_pot}")))?
        / 100;
    Ok((fee_share, total_pot - fee_share))
}
