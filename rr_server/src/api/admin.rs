//! Platform policy handlers. Reading is public; every change is owner-only
//! and the escrow enforces that.

use axum::{
    Json,
    extract::{Extension, Path, State},
};
use roach_race::{AdminPolicy, EscrowError, Identity, Transfer};
use serde::Deserialize;

use super::{AppState, errors::ApiError, extract::ApiJson};

#[derive(Debug, Deserialize)]
pub struct SetFeeRequest {
    pub percent: u16,
}

#[derive(Debug, Deserialize)]
pub struct SetFeeCollectorRequest {
    pub identity: Identity,
}

#[derive(Debug, Deserialize)]
pub struct SetOperatorRequest {
    pub enabled: bool,
}

pub async fn get_policy(State(state): State<AppState>) -> Result<Json<AdminPolicy>, ApiError> {
    Ok(Json(state.escrow.get_policy().await?))
}

/// Set the platform fee (0-20%). Responds with the updated policy.
pub async fn set_platform_fee(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    ApiJson(request): ApiJson<SetFeeRequest>,
) -> Result<Json<AdminPolicy>, ApiError> {
    state
        .escrow
        .set_platform_fee(&caller, request.percent)
        .await?;
    Ok(Json(state.escrow.get_policy().await?))
}

pub async fn set_fee_collector(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    ApiJson(request): ApiJson<SetFeeCollectorRequest>,
) -> Result<Json<AdminPolicy>, ApiError> {
    state
        .escrow
        .set_fee_collector(&caller, request.identity)
        .await?;
    Ok(Json(state.escrow.get_policy().await?))
}

/// Grant or revoke finalization rights
pub async fn set_operator(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(operator): Path<String>,
    ApiJson(request): ApiJson<SetOperatorRequest>,
) -> Result<Json<AdminPolicy>, ApiError> {
    if operator.trim().is_empty() {
        return Err(ApiError::BadRequest("Operator identity must not be empty".to_string()));
    }

    state
        .escrow
        .set_operator(&caller, Identity::new(&operator), request.enabled)
        .await?;
    Ok(Json(state.escrow.get_policy().await?))
}

/// Hand every transfer queued by withdrawals since the last drain to the
/// settlement process. Owner only; each transfer is returned exactly once.
pub async fn drain_payouts(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
) -> Result<Json<Vec<Transfer>>, ApiError> {
    let policy = state.escrow.get_policy().await?;
    if !policy.is_owner(&caller) {
        return Err(EscrowError::Unauthorized {
            caller,
            operation: "drain pending payouts",
        }
        .into());
    }

    let batch = state.payouts.drain();
    tracing::info!(transfers = batch.len(), "Pending payouts drained for settlement");
    Ok(Json(batch))
}
