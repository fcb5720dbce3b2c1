//! Escrow error types.

use crate::race::models::{Amount, Identity, RaceId};
use thiserror::Error;

/// Errors returned by escrow operations. Every error aborts the operation
/// with no state change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EscrowError {
    /// Race creation parameters out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Race ID was never allocated
    #[error("Race {0} does not exist")]
    RaceNotFound(RaceId),

    /// Operation not allowed in the race's current stage
    #[error("Race {race_id} is {stage}, cannot {operation}")]
    InvalidState {
        race_id: RaceId,
        stage: String,
        operation: &'static str,
    },

    /// Tendered stake differs from the entry fee
    #[error("Incorrect entry fee: expected {expected}, got {got}")]
    PaymentMismatch { expected: Amount, got: Amount },

    /// Caller is already a player in this race
    #[error("{0} already joined race {1}")]
    DuplicateJoin(Identity, RaceId),

    /// Race has no free slot
    #[error("Race {race_id} is full ({max_players} players)")]
    RaceFull { race_id: RaceId, max_players: usize },

    /// Race cannot start with fewer than two players
    #[error("Not enough players: race {race_id} has {players}, need {required}")]
    NotEnoughPlayers {
        race_id: RaceId,
        players: usize,
        required: usize,
    },

    /// Winner index outside the player list
    #[error("Invalid winner index {index} for {players} players")]
    InvalidWinner { index: usize, players: usize },

    /// Race already paid out
    #[error("Race {0} already finalized")]
    AlreadyFinalized(RaceId),

    /// Withdraw with zero balance
    #[error("No balance to withdraw for {0}")]
    NoBalance(Identity),

    /// Caller lacks the authority for this operation
    #[error("{caller} is not authorized to {operation}")]
    Unauthorized {
        caller: Identity,
        operation: &'static str,
    },

    /// Platform fee above the allowed maximum
    #[error("Fee too high: {requested}% exceeds maximum {max}%")]
    FeeTooHigh { requested: u16, max: u8 },

    /// Arithmetic overflow in amount bookkeeping
    #[error("Amount overflow: {0}")]
    Overflow(String),

    /// Outbound value transfer was rejected; the withdraw was rolled back
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// The escrow sequencer is not running
    #[error("Escrow unavailable")]
    Unavailable,
}

impl EscrowError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            EscrowError::InvalidParameter(_) => "INVALID_PARAMETER",
            EscrowError::RaceNotFound(_) => "RACE_NOT_FOUND",
            EscrowError::InvalidState { .. } => "INVALID_STATE",
            EscrowError::PaymentMismatch { .. } => "PAYMENT_MISMATCH",
            EscrowError::DuplicateJoin(..) => "DUPLICATE_JOIN",
            EscrowError::RaceFull { .. } => "RACE_FULL",
            EscrowError::NotEnoughPlayers { .. } => "NOT_ENOUGH_PLAYERS",
            EscrowError::InvalidWinner { .. } => "INVALID_WINNER",
            EscrowError::AlreadyFinalized(_) => "ALREADY_FINALIZED",
            EscrowError::NoBalance(_) => "NO_BALANCE",
            EscrowError::Unauthorized { .. } => "UNAUTHORIZED",
            EscrowError::FeeTooHigh { .. } => "FEE_TOO_HIGH",
            EscrowError::Overflow(_) => "OVERFLOW",
            EscrowError::TransferFailed(_) => "TRANSFER_FAILED",
            EscrowError::Unavailable => "UNAVAILABLE",
        }
    }

    /// Get a client-safe error message
    ///
    /// Internal failures (overflow, payout backend errors) are not exposed
    /// verbatim; everything else describes the caller's own mistake.
    pub fn client_message(&self) -> String {
        match self {
            EscrowError::Overflow(_) => "Internal accounting error".to_string(),
            EscrowError::TransferFailed(_) => "Transfer failed, balance restored".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;
