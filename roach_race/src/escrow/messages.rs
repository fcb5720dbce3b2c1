//! Escrow actor message types.

use super::state::{Holdings, Settlement};
use crate::{
    admin::AdminPolicy,
    errors::EscrowResult,
    ledger::LedgerEntry,
    race::{
        events::RaceEvent,
        models::{Amount, CockroachId, Identity, RaceId, RaceStage, RaceView},
    },
};
use tokio::sync::{mpsc, oneshot};

/// Reply channel carried by every request
pub type Reply<T> = oneshot::Sender<EscrowResult<T>>;

/// Messages that can be sent to the EscrowActor
#[derive(Debug)]
pub enum EscrowMessage {
    CreateRace {
        caller: Identity,
        entry_fee: Amount,
        max_players: usize,
        response: Reply<RaceId>,
    },

    JoinRace {
        caller: Identity,
        race_id: RaceId,
        cockroach_id: CockroachId,
        stake: Amount,
        response: Reply<RaceView>,
    },

    StartRace {
        caller: Identity,
        race_id: RaceId,
        response: Reply<RaceView>,
    },

    FinalizeRace {
        caller: Identity,
        race_id: RaceId,
        winner_index: usize,
        response: Reply<Settlement>,
    },

    /// Withdraw the caller's whole balance through the actor's payout sink
    Withdraw {
        caller: Identity,
        response: Reply<Amount>,
    },

    GetRace {
        race_id: RaceId,
        response: Reply<RaceView>,
    },

    ListRaces {
        stage: Option<RaceStage>,
        response: oneshot::Sender<Vec<RaceView>>,
    },

    GetBalance {
        identity: Identity,
        response: oneshot::Sender<Amount>,
    },

    GetStatement {
        identity: Identity,
        response: oneshot::Sender<Vec<LedgerEntry>>,
    },

    GetPolicy {
        response: oneshot::Sender<AdminPolicy>,
    },

    GetHoldings {
        response: oneshot::Sender<Holdings>,
    },

    SetPlatformFee {
        caller: Identity,
        percent: u16,
        response: Reply<()>,
    },

    SetFeeCollector {
        caller: Identity,
        collector: Identity,
        response: Reply<()>,
    },

    SetOperator {
        caller: Identity,
        operator: Identity,
        enabled: bool,
        response: Reply<()>,
    },

    /// Subscribe to committed events
    Subscribe { sender: mpsc::Sender<RaceEvent> },

    /// Stop the actor after replying
    Shutdown { response: oneshot::Sender<()> },
}
