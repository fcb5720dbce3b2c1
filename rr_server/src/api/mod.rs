//! HTTP/WebSocket API for the escrow server.
//!
//! # Architecture
//!
//! The API is built with:
//! - **Axum**: Async web framework for HTTP/WebSocket
//! - **Tower**: Middleware for CORS, request ids and authentication
//! - **JWT**: Bearer tokens whose subject is the caller's account identity
//! - **Actor Model**: All escrow state lives in one actor task behind an
//!   [`EscrowHandle`]
//!
//! # Endpoints Overview
//!
//! ## Public
//! - `GET /health` - Liveness and escrow responsiveness
//! - `GET /api/v1/races?stage=` - List races
//! - `GET /api/v1/races/{id}` - Race details
//! - `GET /api/v1/balances/{identity}` - Withdrawable balance
//! - `GET /api/v1/admin/policy` - Fee, fee collector, owner and operators
//!
//! ## Bearer token required
//! - `POST /api/v1/races` - Create race
//! - `POST /api/v1/races/{id}/join` - Join with exact stake
//! - `POST /api/v1/races/{id}/start` - Lock the race
//! - `POST /api/v1/races/{id}/finalize` - Report winner (owner/operator)
//! - `GET /api/v1/ledger/statement` - Caller's journal
//! - `POST /api/v1/ledger/withdraw` - Withdraw caller's balance
//! - `PUT /api/v1/admin/fee` - Set platform fee (owner)
//! - `PUT /api/v1/admin/fee-collector` - Set fee collector (owner)
//! - `PUT /api/v1/admin/operators/{identity}` - Grant/revoke operator (owner)
//! - `POST /api/v1/admin/payouts/drain` - Take pending withdrawal transfers for settlement (owner)
//!
//! ## WebSocket
//! - `GET /ws/events?token=<jwt>` - Stream of committed escrow events
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod admin;
pub mod auth;
pub mod errors;
pub mod extract;
pub mod ledger;
pub mod middleware;
pub mod races;
pub mod request_id;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
};
use roach_race::{EscrowHandle, OutboxPayout};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use auth::TokenVerifier;

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub escrow: EscrowHandle,
    pub tokens: Arc<TokenVerifier>,
    /// Shared with the escrow actor's payout sink
    pub payouts: OutboxPayout,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use rr_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:6969").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    // Root routes (health check, WebSocket - not versioned)
    let root_routes = Router::new()
        .route("/health", get(health_check))
        // WebSocket route handles its own auth via query parameter
        .route("/ws/events", get(websocket::websocket_handler));

    Router::new()
        .merge(root_routes)
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router(state: AppState) -> Router<AppState> {
    // Public routes (no authentication middleware)
    let public_routes = Router::new()
        .route("/races", get(races::list_races))
        .route("/races/{race_id}", get(races::get_race))
        .route("/balances/{identity}", get(ledger::get_balance))
        .route("/admin/policy", get(admin::get_policy));

    // Protected routes (require authentication middleware)
    let protected_routes = Router::new()
        .route("/races", post(races::create_race))
        .route("/races/{race_id}/join", post(races::join_race))
        .route("/races/{race_id}/start", post(races::start_race))
        .route("/races/{race_id}/finalize", post(races::finalize_race))
        .route("/ledger/statement", get(ledger::get_statement))
        .route("/ledger/withdraw", post(ledger::withdraw))
        .route("/admin/fee", put(admin::set_platform_fee))
        .route("/admin/fee-collector", put(admin::set_fee_collector))
        .route("/admin/operators/{identity}", put(admin::set_operator))
        .route("/admin/payouts/drain", post(admin::drain_payouts))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the escrow actor answers, `503 Service Unavailable`
/// otherwise.
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","escrow":true,"holdings_balanced":true,...}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let holdings = state.escrow.holdings().await.ok();
    let escrow_healthy = holdings.is_some();

    let status_code = if escrow_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if escrow_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "escrow": escrow_healthy,
        "holdings_balanced": holdings.map(|h| h.is_balanced()),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
