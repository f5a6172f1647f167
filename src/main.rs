mod config;
mod cursor;
mod errors;
mod models;
mod protocol;
mod routes;
mod service;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::cursor::CursorClient;
use crate::service::chat_service::ChatService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    let debug = std::env::var("DEBUG").is_ok_and(|v| v.trim().parse::<bool>().unwrap_or(false));
    let default_filter = if debug {
        "cursor_bridge=debug,tower_http=debug"
    } else {
        "cursor_bridge=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config = Arc::new(Config::from_env()?);
    info!("{}", config.redacted_summary());

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let client = CursorClient::new(config.clone())?;
    let chat_service = ChatService::new(config.clone(), client, shutdown.clone());
    let app = routes::router(chat_service);

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            info!("shutting down");
            // Ends open SSE responses so the server can drain.
            shutdown.cancel();
        })
        .await?;
    Ok(())
}
