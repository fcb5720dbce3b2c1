//! Integration tests for the HTTP API.
//!
//! Each test spawns a fresh escrow actor and drives the router in-process
//! with `oneshot`, so no socket or external service is needed.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use roach_race::{EscrowActor, EscrowConfig, EscrowHandle, Identity, OutboxPayout};
use rr_server::api::{self, AppState, auth::TokenVerifier};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method

const SECRET: &str = "test_secret_key_for_testing_only_0123456789";
const OWNER: &str = "0xowner";
const FEE: u128 = 100_000_000_000_000_000;

struct TestServer {
    app: axum::Router,
    tokens: Arc<TokenVerifier>,
    escrow: EscrowHandle,
    payouts: OutboxPayout,
}

impl TestServer {
    fn spawn() -> Self {
        let config = EscrowConfig::new(Identity::new(OWNER));
        let payouts = OutboxPayout::new();
        let (escrow, _task) =
            EscrowActor::spawn(&config, Box::new(payouts.clone())).expect("spawn escrow");
        let tokens = Arc::new(TokenVerifier::new(SECRET, chrono::Duration::hours(1)));

        let app = api::create_router(AppState {
            escrow: escrow.clone(),
            tokens: tokens.clone(),
            payouts: payouts.clone(),
        });

        Self {
            app,
            tokens,
            escrow,
            payouts,
        }
    }

    fn token(&self, identity: &str) -> String {
        self.tokens
            .issue(&Identity::new(identity))
            .expect("issue token")
    }

    async fn request(
        &self,
        method: &str,
        uri: &str,
        identity: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(identity) = identity {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token(identity)),
            );
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create_race(&self, creator: &str, max_players: usize) -> u64 {
        let (status, body) = self
            .request(
                "POST",
                "/api/v1/races",
                Some(creator),
                Some(json!({ "entry_fee": FEE.to_string(), "max_players": max_players })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_u64().unwrap()
    }

    /// Create, fill, start and finalize a two-player race won by `0xbob`
    async fn finished_race(&self) -> u64 {
        let race_id = self.create_race("0xalice", 2).await;
        self.join(race_id, "0xalice", 1).await;
        self.join(race_id, "0xbob", 2).await;
        self.request(
            "POST",
            &format!("/api/v1/races/{race_id}/start"),
            Some("0xalice"),
            None,
        )
        .await;
        let (status, _) = self
            .request(
                "POST",
                &format!("/api/v1/races/{race_id}/finalize"),
                Some(OWNER),
                Some(json!({ "winner_index": 1 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        race_id
    }

    async fn join(&self, race_id: u64, player: &str, cockroach_id: u64) -> (StatusCode, Value) {
        self.request(
            "POST",
            &format!("/api/v1/races/{race_id}/join"),
            Some(player),
            Some(json!({ "cockroach_id": cockroach_id, "stake": FEE.to_string() })),
        )
        .await
    }
}

// ============================================================================
// Health & Public Reads
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let server = TestServer::spawn();

    let (status, body) = server.request("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["holdings_balanced"], true);
}

#[tokio::test]
async fn test_health_check_reports_stopped_escrow() {
    let server = TestServer::spawn();
    server.escrow.shutdown().await.unwrap();

    let (status, body) = server.request("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_list_races_is_public() {
    let server = TestServer::spawn();
    server.create_race("0xalice", 4).await;
    server.create_race("0xbob", 2).await;

    let (status, body) = server.request("GET", "/api/v1/races", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = server
        .request("GET", "/api/v1/races?stage=finalized", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_races_stage_filter_is_case_insensitive() {
    let server = TestServer::spawn();
    server.create_race("0xalice", 2).await;

    let (status, body) = server
        .request("GET", "/api/v1/races?stage=Open", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = server
        .request("GET", "/api/v1/races?stage=lobby", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = TestServer::spawn();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-abc-123")
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "trace-abc-123"
    );
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_protected_route_requires_token() {
    let server = TestServer::spawn();

    let (status, body) = server
        .request(
            "POST",
            "/api/v1/races",
            None,
            Some(json!({ "entry_fee": "1", "max_players": 2 })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_forged_token_is_rejected() {
    let server = TestServer::spawn();
    let forger = TokenVerifier::new(
        "another_secret_key_that_is_long_enough_xx",
        chrono::Duration::hours(1),
    );
    let token = forger.issue(&Identity::new(OWNER)).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/ledger/withdraw")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Race Flow
// ============================================================================

#[tokio::test]
async fn test_full_race_flow() {
    let server = TestServer::spawn();
    let race_id = server.create_race("0xalice", 3).await;

    for (player, roach) in [("0xalice", 11), ("0xbob", 12), ("0xcarol", 13)] {
        let (status, _) = server.join(race_id, player, roach).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, race) = server
        .request(
            "POST",
            &format!("/api/v1/races/{race_id}/start"),
            Some("0xbob"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(race["stage"], "started");
    assert_eq!(race["total_pot"], "300000000000000000");

    let (status, settlement) = server
        .request(
            "POST",
            &format!("/api/v1/races/{race_id}/finalize"),
            Some(OWNER),
            Some(json!({ "winner_index": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settlement["winner"], "0xbob");
    assert_eq!(settlement["winner_share"], "285000000000000000");
    assert_eq!(settlement["fee_share"], "15000000000000000");

    let (status, balance) = server
        .request("GET", "/api/v1/balances/0xBOB", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["balance"], "285000000000000000");

    let (status, statement) = server
        .request("GET", "/api/v1/ledger/statement", Some("0xbob"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(statement.as_array().unwrap().len(), 1);

    let (status, withdrawal) = server
        .request("POST", "/api/v1/ledger/withdraw", Some("0xbob"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(withdrawal["amount"], "285000000000000000");

    let (status, body) = server
        .request("POST", "/api/v1/ledger/withdraw", Some("0xbob"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NO_BALANCE");

    let holdings = server.escrow.holdings().await.unwrap();
    assert!(holdings.is_balanced());
    assert_eq!(holdings.owed_balances, 15_000_000_000_000_000);
}

// ============================================================================
// Error Mapping
// ============================================================================

#[tokio::test]
async fn test_wrong_stake_is_payment_required() {
    let server = TestServer::spawn();
    let race_id = server.create_race("0xalice", 2).await;

    let (status, body) = server
        .request(
            "POST",
            &format!("/api/v1/races/{race_id}/join"),
            Some("0xalice"),
            Some(json!({ "cockroach_id": 1, "stake": "5" })),
        )
        .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "PAYMENT_MISMATCH");
}

#[tokio::test]
async fn test_join_conflicts() {
    let server = TestServer::spawn();
    let race_id = server.create_race("0xalice", 2).await;
    server.join(race_id, "0xalice", 1).await;

    let (status, body) = server.join(race_id, "0xALICE", 2).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_JOIN");

    server.join(race_id, "0xbob", 2).await;
    let (status, body) = server.join(race_id, "0xcarol", 3).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "RACE_FULL");
}

#[tokio::test]
async fn test_unknown_race_is_not_found() {
    let server = TestServer::spawn();

    let (status, body) = server.request("GET", "/api/v1/races/42", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "RACE_NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_race_parameters_are_bad_request() {
    let server = TestServer::spawn();

    let (status, body) = server
        .request(
            "POST",
            "/api/v1/races",
            Some("0xalice"),
            Some(json!({ "entry_fee": FEE.to_string(), "max_players": 11 })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PARAMETER");
}

#[tokio::test]
async fn test_malformed_body_answers_with_error_json() {
    let server = TestServer::spawn();

    let (status, body) = server
        .request(
            "POST",
            "/api/v1/races",
            Some("0xalice"),
            Some(json!({ "entry_fee": "not a number", "max_players": 4 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body["error"].is_string());

    let race_id = server.create_race("0xalice", 2).await;
    let (status, body) = server
        .request(
            "POST",
            &format!("/api/v1/races/{race_id}/join"),
            Some("0xalice"),
            Some(json!({ "stake": FEE.to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_player_cannot_finalize() {
    let server = TestServer::spawn();
    let race_id = server.create_race("0xalice", 2).await;
    server.join(race_id, "0xalice", 1).await;
    server.join(race_id, "0xbob", 2).await;
    server
        .request(
            "POST",
            &format!("/api/v1/races/{race_id}/start"),
            Some("0xalice"),
            None,
        )
        .await;

    let (status, body) = server
        .request(
            "POST",
            &format!("/api/v1/races/{race_id}/finalize"),
            Some("0xalice"),
            Some(json!({ "winner_index": 0 })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (_, race) = server
        .request("GET", &format!("/api/v1/races/{race_id}"), None, None)
        .await;
    assert_eq!(race["stage"], "started");
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_admin_policy_changes() {
    let server = TestServer::spawn();

    let (status, policy) = server
        .request("GET", "/api/v1/admin/policy", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(policy["fee_percent"], 5);

    let (status, policy) = server
        .request(
            "PUT",
            "/api/v1/admin/fee",
            Some(OWNER),
            Some(json!({ "percent": 20 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(policy["fee_percent"], 20);

    let (status, body) = server
        .request(
            "PUT",
            "/api/v1/admin/fee",
            Some(OWNER),
            Some(json!({ "percent": 21 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "FEE_TOO_HIGH");

    let (status, _) = server
        .request(
            "PUT",
            "/api/v1/admin/fee",
            Some("0xmallory"),
            Some(json!({ "percent": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, policy) = server
        .request(
            "PUT",
            "/api/v1/admin/fee-collector",
            Some(OWNER),
            Some(json!({ "identity": "0xtreasury" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(policy["fee_collector"], "0xtreasury");
    assert_eq!(policy["fee_percent"], 20);
}

#[tokio::test]
async fn test_out_of_range_fee_is_rejected_by_policy() {
    let server = TestServer::spawn();

    let (status, body) = server
        .request(
            "PUT",
            "/api/v1/admin/fee",
            Some(OWNER),
            Some(json!({ "percent": 300 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "FEE_TOO_HIGH");

    // Authority is checked before the fee cap
    let (status, body) = server
        .request(
            "PUT",
            "/api/v1/admin/fee",
            Some("0xmallory"),
            Some(json!({ "percent": 300 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (_, policy) = server
        .request("GET", "/api/v1/admin/policy", None, None)
        .await;
    assert_eq!(policy["fee_percent"], 5);
}

#[tokio::test]
async fn test_drained_payouts_contain_each_withdrawal_once() {
    let server = TestServer::spawn();
    server.finished_race().await;

    let (status, _) = server
        .request("POST", "/api/v1/ledger/withdraw", Some("0xbob"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .request("POST", "/api/v1/admin/payouts/drain", Some("0xbob"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, batch) = server
        .request("POST", "/api/v1/admin/payouts/drain", Some(OWNER), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let batch = batch.as_array().unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0]["to"], "0xbob");
    assert_eq!(batch[0]["amount"], "190000000000000000");

    let (status, batch) = server
        .request("POST", "/api/v1/admin/payouts/drain", Some(OWNER), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(batch.as_array().unwrap().is_empty());
    assert!(server.payouts.transfers().is_empty());

    // The fee collector's withdrawal lands in the next batch
    server
        .request("POST", "/api/v1/ledger/withdraw", Some(OWNER), None)
        .await;
    let (_, batch) = server
        .request("POST", "/api/v1/admin/payouts/drain", Some(OWNER), None)
        .await;
    assert_eq!(batch.as_array().unwrap().len(), 1);
    assert_eq!(batch[0]["amount"], "10000000000000000");
}

#[tokio::test]
async fn test_operator_can_finalize() {
    let server = TestServer::spawn();

    let (status, _) = server
        .request(
            "PUT",
            "/api/v1/admin/operators/0xoracle",
            Some(OWNER),
            Some(json!({ "enabled": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let race_id = server.create_race("0xalice", 2).await;
    server.join(race_id, "0xalice", 1).await;
    server.join(race_id, "0xbob", 2).await;
    server
        .request(
            "POST",
            &format!("/api/v1/races/{race_id}/start"),
            Some("0xalice"),
            None,
        )
        .await;

    let (status, settlement) = server
        .request(
            "POST",
            &format!("/api/v1/races/{race_id}/finalize"),
            Some("0xoracle"),
            Some(json!({ "winner_index": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settlement["winner"], "0xalice");
    assert_eq!(settlement["fee_collector"], OWNER);
}
