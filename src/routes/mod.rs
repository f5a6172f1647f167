pub mod api_routes;
pub mod health_routes;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::chat_service::ChatService;

pub fn router(svc: ChatService) -> Router {
    Router::new()
        // OpenAI-compatible API
        .route("/v1/chat/completions", post(api_routes::chat_completions_handler))
        .route("/v1/models", get(api_routes::list_models_handler))
        // Service info
        .route("/health", get(health_routes::health_handler))
        .route("/status", get(health_routes::status_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(svc)
}
