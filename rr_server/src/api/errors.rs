//! Error responses.
//!
//! Every failed request answers with `{"error": message, "code": CODE}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use roach_race::EscrowError;
use serde::{Deserialize, Serialize};

use crate::{logging, metrics};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    /// Rejected by the escrow
    Escrow(EscrowError),
    /// Missing, malformed or expired bearer token
    Unauthenticated(String),
    /// Request could not be interpreted
    BadRequest(String),
}

impl From<EscrowError> for ApiError {
    fn from(e: EscrowError) -> Self {
        ApiError::Escrow(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// HTTP status for an escrow error
pub fn status_for(error: &EscrowError) -> StatusCode {
    match error {
        EscrowError::InvalidParameter(_)
        | EscrowError::InvalidWinner { .. }
        | EscrowError::FeeTooHigh { .. } => StatusCode::BAD_REQUEST,
        EscrowError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        EscrowError::RaceNotFound(_) => StatusCode::NOT_FOUND,
        EscrowError::InvalidState { .. }
        | EscrowError::AlreadyFinalized(_)
        | EscrowError::DuplicateJoin(..)
        | EscrowError::RaceFull { .. }
        | EscrowError::NotEnoughPlayers { .. }
        | EscrowError::NoBalance(_) => StatusCode::CONFLICT,
        EscrowError::PaymentMismatch { .. } => StatusCode::PAYMENT_REQUIRED,
        EscrowError::Overflow(_) | EscrowError::TransferFailed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        EscrowError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Escrow(e) => {
                metrics::escrow_errors_total(e.code());
                match &e {
                    EscrowError::Unauthorized { caller, operation } => {
                        logging::log_security_event(
                            "forbidden",
                            Some(caller.as_str()),
                            &format!("attempted to {operation}"),
                        );
                    }
                    EscrowError::Overflow(_)
                    | EscrowError::TransferFailed(_)
                    | EscrowError::Unavailable => {
                        tracing::error!(code = e.code(), "Escrow failure: {}", e);
                    }
                    _ => {}
                }
                (status_for(&e), e.code(), e.client_message())
            }
            ApiError::Unauthenticated(reason) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", reason)
            }
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason),
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}
