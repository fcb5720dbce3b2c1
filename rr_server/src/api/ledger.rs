//! Balance, statement and withdrawal handlers.

use axum::{
    Json,
    extract::{Extension, Path, State},
};
use roach_race::{Amount, Identity, LedgerEntry, race::models::amount_string};
use serde::{Deserialize, Serialize};

use super::{AppState, errors::ApiError};
use crate::metrics;

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub identity: Identity,
    #[serde(with = "amount_string")]
    pub balance: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawResponse {
    pub identity: Identity,
    #[serde(with = "amount_string")]
    pub amount: Amount,
}

/// Withdrawable balance of any identity (public)
pub async fn get_balance(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let identity = Identity::new(&identity);
    let balance = state.escrow.get_balance(&identity).await?;
    Ok(Json(BalanceResponse { identity, balance }))
}

/// The caller's own journal
pub async fn get_statement(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    Ok(Json(state.escrow.get_statement(&caller).await?))
}

/// Withdraw the caller's entire balance
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
) -> Result<Json<WithdrawResponse>, ApiError> {
    let amount = state.escrow.withdraw(&caller).await?;
    metrics::withdrawals_total();
    tracing::info!(identity = %caller, amount = %amount, "Withdrawal queued for payout");

    Ok(Json(WithdrawResponse {
        identity: caller,
        amount,
    }))
}
