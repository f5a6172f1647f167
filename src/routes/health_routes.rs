use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::service::chat_service::ChatService;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub cursor_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub models_count: usize,
    pub cursor_token_set: bool,
    pub cursor_api_url: String,
    pub cursor_version: String,
}

/// GET `/health`
pub async fn health_handler(State(svc): State<ChatService>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        cursor_configured: svc.config().has_cursor_token(),
    })
}

/// GET `/status`: configuration summary without secrets.
pub async fn status_handler(State(svc): State<ChatService>) -> Json<StatusReport> {
    let config = svc.config();
    Json(StatusReport {
        status: "running",
        models_count: config.models.len(),
        cursor_token_set: config.has_cursor_token(),
        cursor_api_url: config.cursor_api_url.clone(),
        cursor_version: config.cursor_version.clone(),
    })
}
