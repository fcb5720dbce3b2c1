//! Race escrow server.
//!
//! Spawns the escrow actor and serves the HTTP/WebSocket API in front of it.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use pico_args::Arguments;
use roach_race::{EscrowActor, Identity, OutboxPayout};
use rr_server::{
    api::{self, auth::TokenVerifier},
    config::{ConfigOverrides, ServerConfig},
    logging, metrics,
};
use tracing::info;

const HELP: &str = "\
Run the roach race escrow server

USAGE:
  rr_server [OPTIONS]

OPTIONS:
  --bind         IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --owner        ADDRESS     Escrow owner identity        [default: env ESCROW_OWNER]
  --fee          PERCENT     Platform fee, 0-20           [default: env PLATFORM_FEE_PERCENT or 5]
  --issue-token  ADDRESS     Print a bearer token for ADDRESS and exit

FLAGS:
  -h, --help                 Print help information

ENVIRONMENT:
  SERVER_BIND                Server bind address (e.g., 0.0.0.0:8080)
  ESCROW_OWNER               Owner account address (required)
  FEE_COLLECTOR              Fee collector address (default: owner)
  PLATFORM_FEE_PERCENT       Platform fee percent
  ESCROW_OPERATORS           Comma-separated addresses allowed to finalize races
  JWT_SECRET                 JWT signing secret, at least 32 characters (required)
  TOKEN_TTL_SECS             Lifetime of issued tokens [default: 3600]
  METRICS_BIND               Prometheus exporter address (disabled when unset)
  (See .env file for all configuration options)
";

struct Args {
    overrides: ConfigOverrides,
    issue_token: Option<String>,
}

fn parse_args() -> Result<Args, Error> {
    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        overrides: ConfigOverrides {
            bind: pargs.opt_value_from_str::<_, SocketAddr>("--bind")?,
            owner: pargs.opt_value_from_str("--owner")?,
            platform_fee_percent: pargs.opt_value_from_str("--fee")?,
        },
        issue_token: pargs.opt_value_from_str("--issue-token")?,
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        anyhow::bail!("Unexpected arguments: {:?}", remaining);
    }

    Ok(args)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let args = parse_args()?;
    let config = ServerConfig::from_env(args.overrides)?;
    let tokens = Arc::new(TokenVerifier::new(
        &config.security.jwt_secret,
        chrono::Duration::seconds(config.security.token_ttl_secs),
    ));

    if let Some(identity) = args.issue_token {
        println!("{}", tokens.issue(&Identity::new(&identity))?);
        return Ok(());
    }

    logging::init();
    info!("Starting escrow server at {}", config.bind);

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics exported on {}", addr);
    }

    // Withdrawals queue transfers here until the owner drains them for settlement
    let payouts = OutboxPayout::new();
    let (escrow, escrow_task) = EscrowActor::spawn(&config.escrow, Box::new(payouts.clone()))?;
    info!(
        "Escrow ready: owner {}, fee {}%, fee collector {}, {} operator(s)",
        config.escrow.owner,
        config.escrow.platform_fee_percent,
        config.escrow.fee_collector(),
        config.escrow.operators.len()
    );

    let app = api::create_router(api::AppState {
        escrow: escrow.clone(),
        tokens,
        payouts,
    });

    info!("Starting HTTP/WebSocket server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down escrow...");
    escrow.shutdown().await?;
    escrow_task.await?;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
