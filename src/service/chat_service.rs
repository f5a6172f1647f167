use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::cursor::{CursorClient, FragmentStream};
use crate::errors::AppError;
use crate::models::{ChatCompletionRequest, Message};
use crate::protocol::{ChatTurn, WireRole};
use crate::service::history::truncate_history;

#[derive(Clone)]
pub struct ChatService {
    config: Arc<Config>,
    client: CursorClient,
    shutdown: CancellationToken,
}

impl ChatService {
    /// `shutdown` is the parent of every per-request token; cancelling it
    /// ends all in-flight responses.
    pub fn new(config: Arc<Config>, client: CursorClient, shutdown: CancellationToken) -> Self {
        Self { config, client, shutdown }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Truncates the history to the configured budget and maps it onto
    /// backend turns, appending the configured system prompt to system turns.
    pub fn prepare_turns(&self, messages: Vec<Message>) -> Vec<ChatTurn> {
        let inject = self.config.system_prompt_inject.as_str();
        truncate_history(messages, self.config.max_input_length)
            .iter()
            .map(|m| {
                let mut text = m.text();
                if m.is_system() && !inject.is_empty() {
                    text.push('\n');
                    text.push_str(inject);
                }
                ChatTurn::new(WireRole::from_role_name(&m.role), text)
            })
            .collect()
    }

    /// Starts a chat and returns its fragments as they arrive.
    pub async fn stream(
        &self,
        request: ChatCompletionRequest,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, AppError> {
        // ── Validation ────────────────────────────────────────────────────────
        if request.model.trim().is_empty() {
            return Err(AppError::invalid_request("'model' is required"));
        }
        if request.messages.is_empty() {
            return Err(AppError::invalid_request("'messages' must not be empty"));
        }

        let inbound = request.messages.len();
        let turns = self.prepare_turns(request.messages);
        info!(
            model = %request.model,
            stream = request.stream,
            turns = turns.len(),
            dropped = inbound - turns.len(),
            "forwarding chat completion"
        );

        self.client.stream_chat(turns, &request.model, cancel).await
    }

    /// Runs a chat to completion and returns the assembled answer.
    pub async fn complete(
        &self,
        request: ChatCompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String, AppError> {
        self.stream(request, cancel).await?.collect_text().await
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::routing::post;
    use axum::Router;
    use bytes::Bytes;

    use super::*;
    use crate::cursor::client::STREAM_CHAT_PATH;
    use crate::test_support::{config_for, frame, spawn_backend};

    fn service(config: Config) -> ChatService {
        let config = Arc::new(config);
        let client = CursorClient::new(config.clone()).unwrap();
        ChatService::new(config, client, CancellationToken::new())
    }

    fn request(messages: Vec<Message>) -> ChatCompletionRequest {
        ChatCompletionRequest { model: "gpt-4o".into(), messages, stream: false }
    }

    #[test]
    fn prepare_turns_maps_roles_and_injects_system_prompt() {
        let mut config = config_for("http://localhost", "t");
        config.system_prompt_inject = "Answer in English.".into();
        let svc = service(config);

        let turns = svc.prepare_turns(vec![
            Message::new("system", "be brief"),
            Message::new("user", "hello"),
            Message::new("assistant", "hi"),
            Message::new("tool", "{}"),
        ]);
        assert_eq!(
            turns,
            vec![
                ChatTurn::new(WireRole::Other, "be brief\nAnswer in English."),
                ChatTurn::new(WireRole::User, "hello"),
                ChatTurn::new(WireRole::Other, "hi"),
                ChatTurn::new(WireRole::User, "{}"),
            ]
        );
    }

    #[test]
    fn prepare_turns_applies_the_budget() {
        let mut config = config_for("http://localhost", "t");
        config.max_input_length = 5;
        let svc = service(config);

        let turns = svc.prepare_turns(vec![
            Message::new("user", "old message"),
            Message::new("user", "new"),
        ]);
        assert_eq!(turns, vec![ChatTurn::new(WireRole::User, "new")]);
    }

    #[tokio::test]
    async fn empty_message_list_is_rejected() {
        let svc = service(config_for("http://127.0.0.1:9", "t"));
        let err = svc
            .complete(request(Vec::new()), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn complete_assembles_fragments() {
        let app = Router::new().route(
            STREAM_CHAT_PATH,
            post(|| async {
                let mut body = frame("4");
                body.extend(frame("2"));
                Body::from(Bytes::from(body))
            }),
        );
        let base = spawn_backend(app).await;
        let svc = service(config_for(&base, "t"));

        let answer = svc
            .complete(request(vec![Message::new("user", "6*7?")]), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "42");
    }

    #[tokio::test]
    async fn shutdown_cancels_request_tokens() {
        let shutdown = CancellationToken::new();
        let config = Arc::new(config_for("http://localhost", "t"));
        let client = CursorClient::new(config.clone()).unwrap();
        let svc = ChatService::new(config, client, shutdown.clone());

        let token = svc.request_token();
        assert!(!token.is_cancelled());
        shutdown.cancel();
        assert!(token.is_cancelled());
    }
}
