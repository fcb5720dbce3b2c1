//! The escrow state aggregate: race table, ledger and policy.
//!
//! Every public operation validates all of its preconditions against a
//! shared borrow first and only then mutates. A failing operation returns
//! before the first write, so callers never observe a partial change.

use super::{
    clock::{Clock, SystemClock},
    config::EscrowConfig,
};
use crate::{
    admin::AdminPolicy,
    errors::{EscrowError, EscrowResult},
    ledger::{Credit, EntryType, Ledger, LedgerEntry, PayoutSink},
    race::{
        events::RaceEvent,
        lifecycle,
        models::{Amount, CockroachId, Identity, RaceId, RaceStage, RaceView, amount_string},
        registry::RaceRegistry,
    },
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of a finalized race
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub race_id: RaceId,
    pub winner_index: usize,
    pub winner: Identity,
    #[serde(with = "amount_string")]
    pub winner_share: Amount,
    pub fee_collector: Identity,
    #[serde(with = "amount_string")]
    pub fee_share: Amount,
}

/// Where every staked unit currently sits.
///
/// `staked == in_races + owed_balances + withdrawn` holds at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holdings {
    #[serde(with = "amount_string")]
    pub staked: Amount,
    #[serde(with = "amount_string")]
    pub in_races: Amount,
    #[serde(with = "amount_string")]
    pub owed_balances: Amount,
    #[serde(with = "amount_string")]
    pub withdrawn: Amount,
}

impl Holdings {
    pub fn is_balanced(&self) -> bool {
        self.in_races
            .checked_add(self.owed_balances)
            .and_then(|sum| sum.checked_add(self.withdrawn))
            == Some(self.staked)
    }
}

/// Single authoritative escrow state
pub struct EscrowState {
    registry: RaceRegistry,
    ledger: Ledger,
    policy: AdminPolicy,
    clock: Arc<dyn Clock>,
    staked: Amount,
    events: Vec<RaceEvent>,
}

impl std::fmt::Debug for EscrowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscrowState")
            .field("races", &self.registry.race_count())
            .field("policy", &self.policy)
            .field("staked", &self.staked)
            .finish()
    }
}

impl EscrowState {
    /// Create escrow state from a configuration
    ///
    /// # Errors
    ///
    /// * `EscrowError::InvalidParameter` - configuration failed validation
    pub fn new(config: &EscrowConfig) -> EscrowResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &EscrowConfig, clock: Arc<dyn Clock>) -> EscrowResult<Self> {
        config.validate().map_err(EscrowError::InvalidParameter)?;

        let owner = config.owner.clone();
        let mut policy = AdminPolicy::new(owner.clone());
        policy.set_platform_fee(u16::from(config.platform_fee_percent), &owner)?;
        policy.set_fee_collector(config.fee_collector().clone(), &owner)?;
        for operator in &config.operators {
            policy.set_operator(operator.clone(), true, &owner)?;
        }

        Ok(Self {
            registry: RaceRegistry::new(),
            ledger: Ledger::new(),
            policy,
            clock,
            staked: 0,
            events: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Races
    // ------------------------------------------------------------------

    pub fn create_race(
        &mut self,
        entry_fee: Amount,
        max_players: usize,
        caller: &Identity,
    ) -> EscrowResult<RaceId> {
        let now = self.clock.now();
        let race_id = self.registry.create(entry_fee, max_players, now)?;

        log::info!(
            "Race {} created by {} (entry fee {}, max {} players)",
            race_id,
            caller,
            entry_fee,
            max_players
        );
        self.events.push(RaceEvent::RaceCreated {
            race_id,
            entry_fee,
            max_players,
            at: now,
        });

        Ok(race_id)
    }

    pub fn join_race(
        &mut self,
        race_id: RaceId,
        cockroach_id: CockroachId,
        stake: Amount,
        caller: &Identity,
    ) -> EscrowResult<RaceView> {
        let race = self.registry.get(race_id)?;
        let new_pot = lifecycle::check_join(race, caller, stake)?;
        let new_staked = self
            .staked
            .checked_add(stake)
            .ok_or_else(|| EscrowError::Overflow("total staked".to_string()))?;

        let now = self.clock.now();
        let race = self.registry.get_mut(race_id)?;
        lifecycle::apply_join(race, caller.clone(), cockroach_id, new_pot);
        self.staked = new_staked;

        let view = race.view();
        log::info!(
            "{} joined race {} with cockroach {} ({}/{} players)",
            caller,
            race_id,
            cockroach_id,
            view.current_players,
            view.max_players
        );
        self.events.push(RaceEvent::RaceJoined {
            race_id,
            player: caller.clone(),
            cockroach_id,
            current_players: view.current_players,
            total_pot: view.total_pot,
            at: now,
        });

        Ok(view)
    }

    pub fn start_race(&mut self, race_id: RaceId, caller: &Identity) -> EscrowResult<RaceView> {
        lifecycle::check_start(self.registry.get(race_id)?)?;

        let now = self.clock.now();
        let race = self.registry.get_mut(race_id)?;
        let at = lifecycle::apply_start(race, now);

        let view = race.view();
        log::info!(
            "Race {} started by {} with {} players",
            race_id,
            caller,
            view.current_players
        );
        self.events.push(RaceEvent::RaceStarted {
            race_id,
            players: view.players.clone(),
            total_pot: view.total_pot,
            at,
        });

        Ok(view)
    }

    /// Pay out a started race to the player at `winner_index`.
    ///
    /// The fee collector receives `total_pot * fee_percent / 100` (truncated)
    /// and the winner receives the remainder.
    pub fn finalize_race(
        &mut self,
        race_id: RaceId,
        winner_index: usize,
        caller: &Identity,
    ) -> EscrowResult<Settlement> {
        self.policy.require_finalizer(caller)?;
        let race = self.registry.get(race_id)?;
        let winner = lifecycle::check_finalize(race, winner_index)?;
        let (fee_share, winner_share) = self.policy.fee_split(race.total_pot)?;
        let fee_collector = self.policy.fee_collector().clone();

        let credits = [
            Credit {
                identity: winner.clone(),
                amount: winner_share,
                race_id: Some(race_id),
                entry_type: EntryType::Winnings,
            },
            Credit {
                identity: fee_collector.clone(),
                amount: fee_share,
                race_id: Some(race_id),
                entry_type: EntryType::PlatformFee,
            },
        ];
        self.ledger.check_credits(&credits)?;

        let now = self.clock.now();
        self.ledger.credit_all(&credits, now)?;
        let race = self.registry.get_mut(race_id)?;
        let at = lifecycle::apply_finalize(race, winner_index, now);

        log::info!(
            "Race {} finalized by {}: winner {} gets {}, fee {} to {}",
            race_id,
            caller,
            winner,
            winner_share,
            fee_share,
            fee_collector
        );
        self.events.push(RaceEvent::RaceFinalized {
            race_id,
            winner_index,
            winner: winner.clone(),
            winner_share,
            fee_collector: fee_collector.clone(),
            fee_share,
            at,
        });

        Ok(Settlement {
            race_id,
            winner_index,
            winner,
            winner_share,
            fee_collector,
            fee_share,
        })
    }

    pub fn get_race(&self, race_id: RaceId) -> EscrowResult<RaceView> {
        self.registry.get(race_id).map(|race| race.view())
    }

    pub fn list_races(&self, stage: Option<RaceStage>) -> Vec<RaceView> {
        self.registry.list(stage)
    }

    pub fn race_count(&self) -> u64 {
        self.registry.race_count()
    }

    // ------------------------------------------------------------------
    // Ledger
    // ------------------------------------------------------------------

    /// Withdraw the caller's entire balance through `sink`
    pub fn withdraw(&mut self, caller: &Identity, sink: &mut dyn PayoutSink) -> EscrowResult<Amount> {
        let now = self.clock.now();
        let amount = self.ledger.withdraw(caller, sink, now)?;

        log::info!("{} withdrew {}", caller, amount);
        self.events.push(RaceEvent::Withdrawn {
            identity: caller.clone(),
            amount,
            at: now,
        });

        Ok(amount)
    }

    pub fn balance(&self, identity: &Identity) -> Amount {
        self.ledger.balance(identity)
    }

    pub fn statement(&self, identity: &Identity) -> Vec<LedgerEntry> {
        self.ledger.statement(identity)
    }

    pub fn holdings(&self) -> Holdings {
        let in_races: Amount = self
            .registry
            .iter()
            .filter(|race| !race.finalized)
            .map(|race| race.total_pot)
            .sum();

        Holdings {
            staked: self.staked,
            in_races,
            owed_balances: self.ledger.total_owed(),
            withdrawn: self.ledger.total_withdrawn(),
        }
    }

    // ------------------------------------------------------------------
    // Policy
    // ------------------------------------------------------------------

    pub fn policy(&self) -> &AdminPolicy {
        &self.policy
    }

    pub fn set_platform_fee(&mut self, percent: u16, caller: &Identity) -> EscrowResult<()> {
        self.policy.set_platform_fee(percent, caller)?;
        let percent = self.policy.fee_percent();

        log::info!("Platform fee set to {}% by {}", percent, caller);
        self.events.push(RaceEvent::PlatformFeeUpdated {
            percent,
            at: self.clock.now(),
        });
        Ok(())
    }

    pub fn set_fee_collector(&mut self, collector: Identity, caller: &Identity) -> EscrowResult<()> {
        self.policy.set_fee_collector(collector.clone(), caller)?;

        log::info!("Fee collector set to {} by {}", collector, caller);
        self.events.push(RaceEvent::FeeCollectorUpdated {
            fee_collector: collector,
            at: self.clock.now(),
        });
        Ok(())
    }

    pub fn set_operator(
        &mut self,
        operator: Identity,
        enabled: bool,
        caller: &Identity,
    ) -> EscrowResult<()> {
        self.policy.set_operator(operator.clone(), enabled, caller)?;

        log::info!("Operator {} enabled={} by {}", operator, enabled, caller);
        self.events.push(RaceEvent::OperatorUpdated {
            operator,
            enabled,
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Take all events produced since the last drain
    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::OutboxPayout;

    const ENTRY_FEE: Amount = 100_000_000_000_000_000; // 0.1 token

    fn id(s: &str) -> Identity {
        Identity::new(s)
    }

    fn state() -> EscrowState {
        EscrowState::new(&EscrowConfig::new(id("owner"))).unwrap()
    }

    fn started_race(state: &mut EscrowState, players: &[&str]) -> RaceId {
        let race_id = state.create_race(ENTRY_FEE, 4, &id("owner")).unwrap();
        for (i, p) in players.iter().enumerate() {
            state.join_race(race_id, i as u64, ENTRY_FEE, &id(p)).unwrap();
        }
        state.start_race(race_id, &id("owner")).unwrap();
        race_id
    }

    #[test]
    fn test_full_lifecycle_pays_winner_and_fee() {
        let mut state = state();
        let race_id = started_race(&mut state, &["p1", "p2", "p3"]);
        assert_eq!(state.get_race(race_id).unwrap().total_pot, 3 * ENTRY_FEE);

        let settlement = state.finalize_race(race_id, 0, &id("owner")).unwrap();
        assert_eq!(settlement.winner, id("p1"));
        assert_eq!(settlement.winner_share, 285_000_000_000_000_000);
        assert_eq!(settlement.fee_share, 15_000_000_000_000_000);
        assert_eq!(state.balance(&id("p1")), 285_000_000_000_000_000);
        assert_eq!(state.balance(&id("owner")), 15_000_000_000_000_000);
        assert!(state.holdings().is_balanced());

        let events = state.drain_events();
        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], RaceEvent::RaceCreated { .. }));
        assert!(matches!(events[5], RaceEvent::RaceFinalized { .. }));
        assert!(state.drain_events().is_empty());
    }

    #[test]
    fn test_failed_finalize_changes_nothing() {
        let mut state = state();
        let race_id = started_race(&mut state, &["p1", "p2"]);
        state.drain_events();

        assert!(matches!(
            state.finalize_race(race_id, 2, &id("owner")),
            Err(EscrowError::InvalidWinner { .. })
        ));
        assert!(matches!(
            state.finalize_race(race_id, 0, &id("p1")),
            Err(EscrowError::Unauthorized { .. })
        ));
        let race = state.get_race(race_id).unwrap();
        assert!(!race.finalized);
        assert_eq!(race.winner, None);
        assert_eq!(state.balance(&id("owner")), 0);
        assert!(state.drain_events().is_empty());
    }

    #[test]
    fn test_second_finalize_is_rejected() {
        let mut state = state();
        let race_id = started_race(&mut state, &["p1", "p2"]);
        state.finalize_race(race_id, 1, &id("owner")).unwrap();
        let before = (state.get_race(race_id).unwrap(), state.holdings());

        assert_eq!(
            state.finalize_race(race_id, 0, &id("owner")),
            Err(EscrowError::AlreadyFinalized(race_id))
        );
        assert_eq!((state.get_race(race_id).unwrap(), state.holdings()), before);
        assert_eq!(state.get_race(race_id).unwrap().winner, Some(1));
    }

    #[test]
    fn test_operator_can_finalize() {
        let mut config = EscrowConfig::new(id("owner"));
        config.operators.push(id("oracle"));
        config.fee_collector = Some(id("treasury"));
        let mut state = EscrowState::new(&config).unwrap();

        let race_id = started_race(&mut state, &["p1", "p2"]);
        let settlement = state.finalize_race(race_id, 1, &id("oracle")).unwrap();
        assert_eq!(settlement.fee_collector, id("treasury"));
        assert_eq!(state.balance(&id("treasury")), 10_000_000_000_000_000);
    }

    #[test]
    fn test_withdraw_event_and_holdings() {
        let mut state = state();
        let race_id = started_race(&mut state, &["p1", "p2"]);
        state.finalize_race(race_id, 0, &id("owner")).unwrap();
        state.drain_events();

        let mut outbox = OutboxPayout::new();
        let amount = state.withdraw(&id("p1"), &mut outbox).unwrap();
        assert_eq!(amount, 190_000_000_000_000_000);
        assert_eq!(
            state.withdraw(&id("p1"), &mut outbox),
            Err(EscrowError::NoBalance(id("p1")))
        );

        let holdings = state.holdings();
        assert_eq!(holdings.withdrawn, amount);
        assert_eq!(holdings.in_races, 0);
        assert!(holdings.is_balanced());
        assert_eq!(state.drain_events().len(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EscrowConfig::new(id("owner"));
        config.platform_fee_percent = 30;
        assert!(matches!(
            EscrowState::new(&config),
            Err(EscrowError::InvalidParameter(_))
        ));
    }
}
