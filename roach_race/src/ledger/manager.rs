//! Pull-payment ledger.

use super::{
    models::{Credit, EntryDirection, EntryType, LedgerEntry},
    payout::PayoutSink,
};
use crate::{
    errors::{EscrowError, EscrowResult},
    race::models::{Amount, Identity, RaceId},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Withdrawable balance per identity, with an append-only journal.
///
/// Credited only by race finalization and debited only by [`Ledger::withdraw`].
#[derive(Debug, Default)]
pub struct Ledger {
    balances: HashMap<Identity, Amount>,
    entries: Vec<LedgerEntry>,
    total_owed: Amount,
    total_withdrawn: Amount,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Withdrawable balance; zero for unknown identities
    pub fn balance(&self, identity: &Identity) -> Amount {
        self.balances.get(identity).copied().unwrap_or(0)
    }

    /// Sum of all outstanding balances
    pub fn total_owed(&self) -> Amount {
        self.total_owed
    }

    /// Sum of all completed withdrawals
    pub fn total_withdrawn(&self) -> Amount {
        self.total_withdrawn
    }

    /// Journal entries for one identity, oldest first
    pub fn statement(&self, identity: &Identity) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| &e.identity == identity)
            .cloned()
            .collect()
    }

    /// Compute balances after applying `credits`, without writing anything
    fn stage_credits(&self, credits: &[Credit]) -> EscrowResult<(HashMap<Identity, Amount>, Amount)> {
        let mut staged: HashMap<Identity, Amount> = HashMap::new();
        let mut added: Amount = 0;

        for credit in credits {
            let current = staged
                .get(&credit.identity)
                .copied()
                .unwrap_or_else(|| self.balance(&credit.identity));
            let next = current.checked_add(credit.amount).ok_or_else(|| {
                EscrowError::Overflow(format!("balance of {}", credit.identity))
            })?;
            staged.insert(credit.identity.clone(), next);
            added = added
                .checked_add(credit.amount)
                .ok_or_else(|| EscrowError::Overflow("credit batch".to_string()))?;
        }

        self.total_owed
            .checked_add(added)
            .ok_or_else(|| EscrowError::Overflow("total owed".to_string()))?;

        Ok((staged, added))
    }

    /// Check that `credits` can be applied
    pub fn check_credits(&self, credits: &[Credit]) -> EscrowResult<()> {
        self.stage_credits(credits).map(|_| ())
    }

    /// Apply a batch of credits atomically. Zero-amount credits change no
    /// balance and leave no journal entry.
    pub fn credit_all(&mut self, credits: &[Credit], now: DateTime<Utc>) -> EscrowResult<()> {
        let (_, added) = self.stage_credits(credits)?;

        for credit in credits.iter().filter(|c| c.amount > 0) {
            let balance = self.balances.entry(credit.identity.clone()).or_insert(0);
            *balance += credit.amount;
            let balance_after = *balance;
            self.push_entry(
                credit.identity.clone(),
                credit.race_id,
                credit.amount,
                balance_after,
                EntryDirection::Credit,
                credit.entry_type,
                now,
            );
        }
        self.total_owed += added;

        Ok(())
    }

    /// Withdraw the caller's whole balance
    ///
    /// The balance is zeroed and journaled *before* the sink runs, so
    /// nothing the transfer triggers can observe or spend the old balance.
    /// If the sink fails, both the balance and the journal are restored.
    ///
    /// # Errors
    ///
    /// * `EscrowError::NoBalance` - nothing to withdraw
    /// * `EscrowError::TransferFailed` - sink rejected the transfer
    pub fn withdraw(
        &mut self,
        caller: &Identity,
        sink: &mut dyn PayoutSink,
        now: DateTime<Utc>,
    ) -> EscrowResult<Amount> {
        let amount = self.balance(caller);
        if amount == 0 {
            return Err(EscrowError::NoBalance(caller.clone()));
        }

        self.balances.insert(caller.clone(), 0);
        self.total_owed -= amount;
        self.total_withdrawn += amount;
        self.push_entry(
            caller.clone(),
            None,
            amount,
            0,
            EntryDirection::Debit,
            EntryType::Withdrawal,
            now,
        );

        if let Err(e) = sink.transfer(caller, amount) {
            log::error!("Payout of {} to {} failed: {}", amount, caller, e);
            self.entries.pop();
            self.total_withdrawn -= amount;
            self.total_owed += amount;
            self.balances.insert(caller.clone(), amount);
            return Err(EscrowError::TransferFailed(e.to_string()));
        }

        Ok(amount)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_entry(
        &mut self,
        identity: Identity,
        race_id: Option<RaceId>,
        amount: Amount,
        balance_after: Amount,
        direction: EntryDirection,
        entry_type: EntryType,
        created_at: DateTime<Utc>,
    ) {
        let id = self.entries.len() as u64 + 1;
        self.entries.push(LedgerEntry {
            id,
            identity,
            race_id,
            amount,
            balance_after,
            direction,
            entry_type,
            created_at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::payout::{OutboxPayout, PayoutError};

    fn winnings(who: &str, amount: Amount) -> Credit {
        Credit {
            identity: Identity::new(who),
            amount,
            race_id: Some(1),
            entry_type: EntryType::Winnings,
        }
    }

    #[test]
    fn test_withdraw_zeroes_then_transfers() {
        let mut ledger = Ledger::new();
        let alice = Identity::new("alice");
        ledger.credit_all(&[winnings("alice", 285)], Utc::now()).unwrap();

        let mut outbox = OutboxPayout::new();
        assert_eq!(ledger.withdraw(&alice, &mut outbox, Utc::now()), Ok(285));
        assert_eq!(ledger.balance(&alice), 0);
        assert_eq!(outbox.total_sent_to(&alice), 285);

        assert_eq!(
            ledger.withdraw(&alice, &mut outbox, Utc::now()),
            Err(EscrowError::NoBalance(alice.clone()))
        );
        assert_eq!(outbox.transfers().len(), 1);
        assert_eq!(ledger.total_withdrawn(), 285);
        assert_eq!(ledger.total_owed(), 0);
    }

    #[test]
    fn test_closure_sink_receives_transfer() {
        let mut ledger = Ledger::new();
        let alice = Identity::new("alice");
        ledger.credit_all(&[winnings("alice", 50)], Utc::now()).unwrap();

        let mut seen = Vec::new();
        let mut sink = |to: &Identity, amount: Amount| -> Result<(), PayoutError> {
            seen.push((to.clone(), amount));
            Ok(())
        };
        ledger.withdraw(&alice, &mut sink, Utc::now()).unwrap();
        assert_eq!(seen, vec![(alice.clone(), 50)]);

        let statement = ledger.statement(&alice);
        assert_eq!(statement.len(), 2);
        assert_eq!(statement[1].direction, EntryDirection::Debit);
        assert_eq!(statement[1].balance_after, 0);
    }

    #[test]
    fn test_failed_transfer_restores_balance() {
        let mut ledger = Ledger::new();
        let bob = Identity::new("bob");
        ledger.credit_all(&[winnings("bob", 70)], Utc::now()).unwrap();

        let mut failing = |_: &Identity, _: Amount| -> Result<(), PayoutError> {
            Err(PayoutError("node offline".to_string()))
        };
        assert!(matches!(
            ledger.withdraw(&bob, &mut failing, Utc::now()),
            Err(EscrowError::TransferFailed(_))
        ));
        assert_eq!(ledger.balance(&bob), 70);
        assert_eq!(ledger.statement(&bob).len(), 1);
        assert_eq!(ledger.total_owed(), 70);
        assert_eq!(ledger.total_withdrawn(), 0);
    }

    #[test]
    fn test_credit_batch_is_all_or_nothing() {
        let mut ledger = Ledger::new();
        ledger
            .credit_all(&[winnings("whale", Amount::MAX - 1)], Utc::now())
            .unwrap();

        let batch = [winnings("minnow", 5), winnings("whale", 10)];
        assert!(matches!(
            ledger.credit_all(&batch, Utc::now()),
            Err(EscrowError::Overflow(_))
        ));
        assert_eq!(ledger.balance(&Identity::new("minnow")), 0);
        assert_eq!(ledger.statement(&Identity::new("minnow")).len(), 0);
    }

    #[test]
    fn test_same_identity_credited_twice_in_one_batch() {
        let mut ledger = Ledger::new();
        let batch = [
            winnings("owner", 95),
            Credit {
                identity: Identity::new("owner"),
                amount: 5,
                race_id: Some(1),
                entry_type: EntryType::PlatformFee,
            },
            winnings("nobody", 0),
        ];
        ledger.credit_all(&batch, Utc::now()).unwrap();
        assert_eq!(ledger.balance(&Identity::new("owner")), 100);
        assert_eq!(ledger.statement(&Identity::new("owner")).len(), 2);
        assert!(ledger.statement(&Identity::new("nobody")).is_empty());
        assert_eq!(ledger.total_owed(), 100);
    }
}
