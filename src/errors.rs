use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::{ErrorDetail, ErrorResponse};

/// Top-level application error.
/// Only configuration, request, and upstream failures reach callers; framing
/// noise in the response stream is absorbed by the decoder.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration / auth ─────────────────────────────────────────────────
    #[error("CURSOR_TOKEN is not configured")]
    MissingCredential,

    #[error("Invalid API key")]
    Unauthorized,

    // ── Validation ───────────────────────────────────────────────────────────
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // ── Upstream ─────────────────────────────────────────────────────────────
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Upstream transport failed: {message}")]
    Transport { message: String },

    #[error("Upstream did not respond within {timeout:?}")]
    UpstreamTimeout { timeout: Duration },

    // ── System ───────────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        AppError::InvalidRequest { message: message.into() }
    }

    pub fn transport(message: impl std::fmt::Display) -> Self {
        AppError::Transport { message: message.to_string() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingCredential | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Transport { .. } => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// OpenAI-style `error.type`.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MissingCredential | AppError::Unauthorized => "authentication_error",
            AppError::InvalidRequest { .. } => "invalid_request_error",
            AppError::Upstream { .. } | AppError::Transport { .. } | AppError::UpstreamTimeout { .. } => {
                "api_error"
            }
            AppError::Unexpected(_) => "server_error",
        }
    }

    /// OpenAI-style `error.code`.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingCredential => "cursor_token_missing",
            AppError::Unauthorized => "invalid_api_key",
            AppError::InvalidRequest { .. } => "invalid_request",
            AppError::Upstream { .. } => "cursor_api_error",
            AppError::Transport { .. } => "cursor_transport_error",
            AppError::UpstreamTimeout { .. } => "cursor_timeout",
            AppError::Unexpected(_) => "internal_error",
        }
    }

    pub fn to_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                kind: self.kind().to_string(),
                param: None,
                code: Some(self.code().to_string()),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::MissingCredential.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::invalid_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::transport("reset").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::UpstreamTimeout { timeout: Duration::from_secs(5) }.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::Upstream { status: 429, message: "slow down".into() }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Upstream { status: 42, message: String::new() }.status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn timeout_message_keeps_sub_second_precision() {
        let err = AppError::UpstreamTimeout { timeout: Duration::from_millis(250) };
        assert_eq!(err.to_string(), "Upstream did not respond within 250ms");
        assert_eq!(err.code(), "cursor_timeout");
    }

    #[test]
    fn upstream_message_is_passed_through() {
        let err = AppError::Upstream { status: 403, message: "not allowed".into() };
        let body = err.to_body();
        assert_eq!(body.error.message, "not allowed");
        assert_eq!(body.error.kind, "api_error");
        assert_eq!(body.error.code.as_deref(), Some("cursor_api_error"));
    }

    #[test]
    fn body_serializes_as_openai_error_envelope() {
        let json = serde_json::to_value(AppError::Unauthorized.to_body()).unwrap();
        assert_eq!(json["error"]["type"], "authentication_error");
        assert_eq!(json["error"]["message"], "Invalid API key");
        assert_eq!(json["error"]["code"], "invalid_api_key");
    }
}
