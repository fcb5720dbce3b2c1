//! Structured logging configuration.
//!
//! `tracing` drives the server's own spans and events. Records emitted
//! through the `log` facade (the escrow library, the websocket handler) are
//! forwarded into the same subscriber.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,tower_http=warn";

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use rr_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Console layer
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of security event
/// * `identity` - Caller identity, when known
/// * `message` - Event message
///
/// # Example
///
/// ```
/// use rr_server::logging::log_security_event;
///
/// log_security_event("invalid_token", None, "Signature mismatch");
/// ```
pub fn log_security_event(event_type: &str, identity: Option<&str>, message: &str) {
    tracing::warn!(
        event_type = event_type,
        identity = identity,
        "SECURITY: {}",
        message
    );
}
