//! Race API handlers.
//!
//! Listing and reading races is public. Creating, joining, starting and
//! finalizing require a bearer token; the token's identity is the caller.
//!
//! # Examples
//!
//! Create a race with a 0.1 token entry fee:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/races \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"entry_fee": "100000000000000000", "max_players": 4}'
//! ```
//!
//! Join it:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/races/1/join \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"cockroach_id": 7, "stake": "100000000000000000"}'
//! ```

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use roach_race::{
    Amount, CockroachId, Identity, RaceId, RaceStage, RaceView, Settlement,
    race::models::amount_string,
};
use serde::Deserialize;

use super::{AppState, errors::ApiError, extract::ApiJson};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct ListRacesQuery {
    pub stage: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRaceRequest {
    #[serde(with = "amount_string")]
    pub entry_fee: Amount,
    pub max_players: usize,
}

#[derive(Debug, Deserialize)]
pub struct JoinRaceRequest {
    pub cockroach_id: CockroachId,
    #[serde(with = "amount_string")]
    pub stake: Amount,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeRaceRequest {
    pub winner_index: usize,
}

/// List races, optionally filtered by `?stage=open|started|finalized`
pub async fn list_races(
    State(state): State<AppState>,
    Query(query): Query<ListRacesQuery>,
) -> Result<Json<Vec<RaceView>>, ApiError> {
    let stage = query
        .stage
        .map(|stage| stage.parse::<RaceStage>())
        .transpose()
        .map_err(ApiError::BadRequest)?;

    Ok(Json(state.escrow.list_races(stage).await?))
}

pub async fn get_race(
    State(state): State<AppState>,
    Path(race_id): Path<RaceId>,
) -> Result<Json<RaceView>, ApiError> {
    Ok(Json(state.escrow.get_race(race_id).await?))
}

/// Create a race. Responds `201 Created` with the new race.
pub async fn create_race(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    ApiJson(request): ApiJson<CreateRaceRequest>,
) -> Result<(StatusCode, Json<RaceView>), ApiError> {
    let race_id = state
        .escrow
        .create_race(&caller, request.entry_fee, request.max_players)
        .await?;
    metrics::races_created_total();

    let race = state.escrow.get_race(race_id).await?;
    Ok((StatusCode::CREATED, Json(race)))
}

/// Join a race. `stake` must equal the race's entry fee exactly.
pub async fn join_race(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(race_id): Path<RaceId>,
    ApiJson(request): ApiJson<JoinRaceRequest>,
) -> Result<Json<RaceView>, ApiError> {
    let race = state
        .escrow
        .join_race(&caller, race_id, request.cockroach_id, request.stake)
        .await?;
    metrics::race_joins_total();

    Ok(Json(race))
}

pub async fn start_race(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(race_id): Path<RaceId>,
) -> Result<Json<RaceView>, ApiError> {
    Ok(Json(state.escrow.start_race(&caller, race_id).await?))
}

/// Report the winner and credit the pot. Owner or operator only.
pub async fn finalize_race(
    State(state): State<AppState>,
    Extension(caller): Extension<Identity>,
    Path(race_id): Path<RaceId>,
    ApiJson(request): ApiJson<FinalizeRaceRequest>,
) -> Result<Json<Settlement>, ApiError> {
    let settlement = state
        .escrow
        .finalize_race(&caller, race_id, request.winner_index)
        .await?;
    metrics::races_finalized_total();

    Ok(Json(settlement))
}
