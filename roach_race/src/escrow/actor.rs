//! Escrow actor: the single sequencer for every state-changing operation.
//!
//! Requests are processed strictly one at a time in arrival order. A
//! request submitted while another is running (including one sent from
//! inside a payout transfer) is queued and observes the committed result
//! of everything before it.

use super::{
    config::EscrowConfig,
    messages::{EscrowMessage, Reply},
    state::{EscrowState, Holdings, Settlement},
};
use crate::{
    admin::AdminPolicy,
    errors::{EscrowError, EscrowResult},
    ledger::{LedgerEntry, PayoutSink},
    race::{
        events::RaceEvent,
        models::{Amount, CockroachId, Identity, RaceId, RaceStage, RaceView},
    },
};
use std::collections::HashMap;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

/// Escrow actor handle for sending messages
#[derive(Clone, Debug)]
pub struct EscrowHandle {
    sender: mpsc::Sender<EscrowMessage>,
    subscriber_capacity: usize,
}

impl EscrowHandle {
    fn new(sender: mpsc::Sender<EscrowMessage>, subscriber_capacity: usize) -> Self {
        Self {
            sender,
            subscriber_capacity,
        }
    }

    /// Send a message to the actor
    pub async fn send(&self, message: EscrowMessage) -> EscrowResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| EscrowError::Unavailable)
    }

    /// Enqueue a message without waiting. Usable from synchronous code such
    /// as a payout sink.
    pub fn try_send(&self, message: EscrowMessage) -> EscrowResult<()> {
        self.sender.try_send(message).map_err(|e| {
            log::warn!("Escrow inbox rejected message: {}", e);
            EscrowError::Unavailable
        })
    }

    async fn query<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> EscrowMessage) -> EscrowResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| EscrowError::Unavailable)
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> EscrowMessage) -> EscrowResult<T> {
        self.query(make).await?
    }

    pub async fn create_race(
        &self,
        caller: &Identity,
        entry_fee: Amount,
        max_players: usize,
    ) -> EscrowResult<RaceId> {
        self.call(|response| EscrowMessage::CreateRace {
            caller: caller.clone(),
            entry_fee,
            max_players,
            response,
        })
        .await
    }

    pub async fn join_race(
        &self,
        caller: &Identity,
        race_id: RaceId,
        cockroach_id: CockroachId,
        stake: Amount,
    ) -> EscrowResult<RaceView> {
        self.call(|response| EscrowMessage::JoinRace {
            caller: caller.clone(),
            race_id,
            cockroach_id,
            stake,
            response,
        })
        .await
    }

    pub async fn start_race(&self, caller: &Identity, race_id: RaceId) -> EscrowResult<RaceView> {
        self.call(|response| EscrowMessage::StartRace {
            caller: caller.clone(),
            race_id,
            response,
        })
        .await
    }

    pub async fn finalize_race(
        &self,
        caller: &Identity,
        race_id: RaceId,
        winner_index: usize,
    ) -> EscrowResult<Settlement> {
        self.call(|response| EscrowMessage::FinalizeRace {
            caller: caller.clone(),
            race_id,
            winner_index,
            response,
        })
        .await
    }

    pub async fn withdraw(&self, caller: &Identity) -> EscrowResult<Amount> {
        self.call(|response| EscrowMessage::Withdraw {
            caller: caller.clone(),
            response,
        })
        .await
    }

    pub async fn get_race(&self, race_id: RaceId) -> EscrowResult<RaceView> {
        self.call(|response| EscrowMessage::GetRace { race_id, response })
            .await
    }

    pub async fn list_races(&self, stage: Option<RaceStage>) -> EscrowResult<Vec<RaceView>> {
        self.query(|response| EscrowMessage::ListRaces { stage, response })
            .await
    }

    pub async fn get_balance(&self, identity: &Identity) -> EscrowResult<Amount> {
        self.query(|response| EscrowMessage::GetBalance {
            identity: identity.clone(),
            response,
        })
        .await
    }

    pub async fn get_statement(&self, identity: &Identity) -> EscrowResult<Vec<LedgerEntry>> {
        self.query(|response| EscrowMessage::GetStatement {
            identity: identity.clone(),
            response,
        })
        .await
    }

    pub async fn get_policy(&self) -> EscrowResult<AdminPolicy> {
        self.query(|response| EscrowMessage::GetPolicy { response })
            .await
    }

    pub async fn holdings(&self) -> EscrowResult<Holdings> {
        self.query(|response| EscrowMessage::GetHoldings { response })
            .await
    }

    pub async fn set_platform_fee(&self, caller: &Identity, percent: u16) -> EscrowResult<()> {
        self.call(|response| EscrowMessage::SetPlatformFee {
            caller: caller.clone(),
            percent,
            response,
        })
        .await
    }

    pub async fn set_fee_collector(&self, caller: &Identity, collector: Identity) -> EscrowResult<()> {
        self.call(|response| EscrowMessage::SetFeeCollector {
            caller: caller.clone(),
            collector,
            response,
        })
        .await
    }

    pub async fn set_operator(
        &self,
        caller: &Identity,
        operator: Identity,
        enabled: bool,
    ) -> EscrowResult<()> {
        self.call(|response| EscrowMessage::SetOperator {
            caller: caller.clone(),
            operator,
            enabled,
            response,
        })
        .await
    }

    /// Receive every event committed after this call returns
    pub async fn subscribe(&self) -> EscrowResult<mpsc::Receiver<RaceEvent>> {
        let (sender, receiver) = mpsc::channel(self.subscriber_capacity);
        self.send(EscrowMessage::Subscribe { sender }).await?;
        Ok(receiver)
    }

    /// Stop the actor. Requests already queued ahead of this one are still
    /// answered; later ones fail with `Unavailable`.
    pub async fn shutdown(&self) -> EscrowResult<()> {
        self.query(|response| EscrowMessage::Shutdown { response })
            .await
    }
}

/// Escrow actor owning the escrow state and the payout sink
pub struct EscrowActor {
    state: EscrowState,

    /// Message inbox
    inbox: mpsc::Receiver<EscrowMessage>,

    /// Outbound transfer channel used by withdrawals
    payout: Box<dyn PayoutSink>,

    /// Event subscribers
    subscribers: HashMap<u64, mpsc::Sender<RaceEvent>>,

    next_subscriber_id: u64,
}

impl EscrowActor {
    /// Create a new escrow actor
    ///
    /// # Returns
    ///
    /// * `(EscrowActor, EscrowHandle)` - Actor and handle for sending messages
    ///
    /// # Errors
    ///
    /// * `EscrowError::InvalidParameter` - configuration failed validation
    pub fn new(
        config: &EscrowConfig,
        payout: Box<dyn PayoutSink>,
    ) -> EscrowResult<(Self, EscrowHandle)> {
        let state = EscrowState::new(config)?;
        Ok(Self::with_state(state, config, payout))
    }

    /// Wrap existing state. Channel capacities come from `config`.
    pub fn with_state(
        state: EscrowState,
        config: &EscrowConfig,
        payout: Box<dyn PayoutSink>,
    ) -> (Self, EscrowHandle) {
        let (sender, inbox) = mpsc::channel(config.inbox_capacity);

        let actor = Self {
            state,
            inbox,
            payout,
            subscribers: HashMap::new(),
            next_subscriber_id: 1,
        };

        (actor, EscrowHandle::new(sender, config.subscriber_capacity))
    }

    /// Create the actor and run it on the current tokio runtime
    pub fn spawn(
        config: &EscrowConfig,
        payout: Box<dyn PayoutSink>,
    ) -> EscrowResult<(EscrowHandle, JoinHandle<()>)> {
        let (actor, handle) = Self::new(config, payout)?;
        let task = tokio::spawn(actor.run());
        Ok((handle, task))
    }

    /// Run the actor event loop until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        log::info!(
            "Escrow actor starting (owner {}, fee {}%)",
            self.state.policy().owner(),
            self.state.policy().fee_percent()
        );

        while let Some(message) = self.inbox.recv().await {
            let keep_running = self.handle_message(message);
            self.publish_events();

            if !keep_running {
                break;
            }
        }

        log::info!(
            "Escrow actor stopped after {} races",
            self.state.race_count()
        );
    }

    /// Handle one message. Returns false on shutdown.
    fn handle_message(&mut self, message: EscrowMessage) -> bool {
        match message {
            EscrowMessage::CreateRace {
                caller,
                entry_fee,
                max_players,
                response,
            } => {
                let result = self.state.create_race(entry_fee, max_players, &caller);
                reply(response, "create race", result);
            }

            EscrowMessage::JoinRace {
                caller,
                race_id,
                cockroach_id,
                stake,
                response,
            } => {
                let result = self.state.join_race(race_id, cockroach_id, stake, &caller);
                reply(response, "join race", result);
            }

            EscrowMessage::StartRace {
                caller,
                race_id,
                response,
            } => {
                let result = self.state.start_race(race_id, &caller);
                reply(response, "start race", result);
            }

            EscrowMessage::FinalizeRace {
                caller,
                race_id,
                winner_index,
                response,
            } => {
                let result = self.state.finalize_race(race_id, winner_index, &caller);
                reply(response, "finalize race", result);
            }

            EscrowMessage::Withdraw { caller, response } => {
                let result = self.state.withdraw(&caller, self.payout.as_mut());
                reply(response, "withdraw", result);
            }

            EscrowMessage::GetRace { race_id, response } => {
                let _ = response.send(self.state.get_race(race_id));
            }

            EscrowMessage::ListRaces { stage, response } => {
                let _ = response.send(self.state.list_races(stage));
            }

            EscrowMessage::GetBalance { identity, response } => {
                let _ = response.send(self.state.balance(&identity));
            }

            EscrowMessage::GetStatement { identity, response } => {
                let _ = response.send(self.state.statement(&identity));
            }

            EscrowMessage::GetPolicy { response } => {
                let _ = response.send(self.state.policy().clone());
            }

            EscrowMessage::GetHoldings { response } => {
                let _ = response.send(self.state.holdings());
            }

            EscrowMessage::SetPlatformFee {
                caller,
                percent,
                response,
            } => {
                let result = self.state.set_platform_fee(percent, &caller);
                reply(response, "set platform fee", result);
            }

            EscrowMessage::SetFeeCollector {
                caller,
                collector,
                response,
            } => {
                let result = self.state.set_fee_collector(collector, &caller);
                reply(response, "set fee collector", result);
            }

            EscrowMessage::SetOperator {
                caller,
                operator,
                enabled,
                response,
            } => {
                let result = self.state.set_operator(operator, enabled, &caller);
                reply(response, "set operator", result);
            }

            EscrowMessage::Subscribe { sender } => {
                let id = self.next_subscriber_id;
                self.next_subscriber_id += 1;
                self.subscribers.insert(id, sender);
                log::debug!("Subscriber {} registered", id);
            }

            EscrowMessage::Shutdown { response } => {
                log::info!("Escrow actor shutting down");
                self.inbox.close();
                let _ = response.send(());
                return false;
            }
        }

        true
    }

    /// Push committed events to all subscribers
    fn publish_events(&mut self) {
        let events = self.state.drain_events();
        if events.is_empty() {
            return;
        }

        for event in events {
            self.subscribers
                .retain(|id, sender| match sender.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        log::warn!("Subscriber {} channel full, dropping event", id);
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        log::debug!("Subscriber {} disconnected, removing", id);
                        false
                    }
                });
        }
    }
}

fn reply<T>(response: Reply<T>, operation: &str, result: EscrowResult<T>) {
    if let Err(e) = &result {
        log::debug!("{} rejected: {}", operation, e);
    }
    let _ = response.send(result);
}
