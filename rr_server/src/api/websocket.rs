//! WebSocket stream of escrow events.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/events?token=<jwt>`
//! 2. Server validates the token and subscribes to the escrow actor
//! 3. Every committed [`RaceEvent`] is pushed as a JSON text frame
//! 4. The stream ends when the client closes or the escrow stops
//!
//! Clients cannot send commands on this socket; use the HTTP API.
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws/events?token=eyJhbGc...');
//!
//! ws.onmessage = (event) => {
//!   const data = JSON.parse(event.data);
//!   if (data.type === "race_finalized") {
//!     showWinner(data.race_id, data.winner, data.winner_share);
//!   }
//! };
//! ```

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use roach_race::{Identity, RaceEvent};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{AppState, errors::ApiError, request_id::RequestId};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: String,
}

/// Upgrade HTTP connection to a WebSocket event stream.
///
/// Returns `401 Unauthorized` when the token is invalid.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
    request_id: RequestId,
) -> Response {
    let identity = match state.tokens.verify(&query.token) {
        Ok(claims) => claims.identity(),
        Err(e) => {
            warn!("WebSocket auth failed ({}): {}", request_id.as_str(), e);
            return ApiError::Unauthenticated("Invalid or expired token".to_string())
                .into_response();
        }
    };

    // Subscribe before upgrading so no event between handshake and the first
    // frame is missed
    let events = match state.escrow.subscribe().await {
        Ok(events) => events,
        Err(e) => return ApiError::from(e).into_response(),
    };

    metrics::websocket_connections_total();
    info!(
        "WebSocket connected: identity={}, request={}",
        identity,
        request_id.as_str()
    );

    ws.on_upgrade(move |socket| handle_socket(socket, identity, events))
}

/// Serialize one event into a text frame
pub fn event_frame(event: &RaceEvent) -> Option<Message> {
    match event.to_json() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("Failed to serialize event {}: {}", event, e);
            None
        }
    }
}

/// Handle an established WebSocket connection.
///
/// A send task forwards events while this task drains the client side,
/// answering nothing but noticing the close.
async fn handle_socket(
    socket: WebSocket,
    identity: Identity,
    mut events: mpsc::Receiver<RaceEvent>,
) {
    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(frame) = event_frame(&event) else {
                continue;
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }

        // Escrow stopped: tell the client
        let _ = sender.send(Message::Close(None)).await;
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => {
                debug!("Ignoring client message from {}: {}", identity, text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error for {}: {}", identity, e);
                break;
            }
        }
    }

    send_task.abort();
    info!("WebSocket disconnected: identity={}", identity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_event_frame_is_tagged_json() {
        let event = RaceEvent::Withdrawn {
            identity: Identity::new("0xabc"),
            amount: 1_900,
            at: Utc::now(),
        };

        let Some(Message::Text(text)) = event_frame(&event) else {
            panic!("expected a text frame");
        };
        let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(json["type"], "withdrawn");
        assert_eq!(json["amount"], "1900");
    }
}
