use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::{self, Stream};
use tracing::warn;

use crate::cursor::FragmentStream;
use crate::errors::AppError;
use crate::models::{ChatCompletionRequest, CompletionMeta, Delta, ModelInfo, ModelList};
use crate::service::chat_service::ChatService;

// ── Auth ──────────────────────────────────────────────────────────────────────

/// Accepts `Authorization: Bearer <key>` as well as the bare key.
fn authorize(headers: &HeaderMap, api_key: &str) -> Result<(), AppError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match presented {
        Some(key) if key == api_key => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST `/v1/chat/completions`
pub async fn chat_completions_handler(
    State(svc): State<ChatService>,
    headers: HeaderMap,
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    authorize(&headers, &svc.config().api_key)?;
    let Json(request) = body.map_err(|e| AppError::invalid_request(e.body_text()))?;

    let meta = CompletionMeta::new(request.model.clone());
    let cancel = svc.request_token();

    if request.stream {
        let fragments = svc.stream(request, cancel).await?;
        let sse = Sse::new(completion_events(fragments, meta)).keep_alive(KeepAlive::default());
        Ok(sse.into_response())
    } else {
        let answer = svc.complete(request, cancel).await?;
        Ok(Json(meta.completion(answer)).into_response())
    }
}

/// GET `/v1/models`
pub async fn list_models_handler(
    State(svc): State<ChatService>,
    headers: HeaderMap,
) -> Result<Json<ModelList>, AppError> {
    authorize(&headers, &svc.config().api_key)?;
    Ok(Json(ModelList {
        object: "list".to_string(),
        data: svc.config().models.iter().map(|id| ModelInfo::new(id)).collect(),
    }))
}

// ── SSE ───────────────────────────────────────────────────────────────────────

enum Phase {
    Streaming,
    Done,
    Finished,
}

struct ChunkState {
    fragments: FragmentStream,
    meta: CompletionMeta,
    role_sent: bool,
    phase: Phase,
}

/// One `chat.completion.chunk` per fragment, a closing `stop` chunk, then
/// `[DONE]`. A transport error replaces the closing chunk with an error
/// object. Dropping the stream (client disconnect) cancels the upstream read.
fn completion_events(
    fragments: FragmentStream,
    meta: CompletionMeta,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    let state = ChunkState { fragments, meta, role_sent: false, phase: Phase::Streaming };

    stream::unfold(state, |mut st| async move {
        let event = match st.phase {
            Phase::Finished => return None,
            Phase::Done => {
                st.phase = Phase::Finished;
                Ok(Event::default().data("[DONE]"))
            }
            Phase::Streaming => match st.fragments.next().await {
                Some(Ok(text)) => {
                    let delta = Delta {
                        role: (!st.role_sent).then(|| "assistant".to_string()),
                        content: Some(text),
                    };
                    st.role_sent = true;
                    Event::default().json_data(st.meta.chunk(delta, None))
                }
                Some(Err(e)) => {
                    warn!(id = %st.meta.id, "stream ended with error: {e}");
                    st.phase = Phase::Done;
                    Event::default().json_data(e.to_body())
                }
                None => {
                    st.phase = Phase::Done;
                    Event::default().json_data(st.meta.chunk(Delta::default(), Some("stop")))
                }
            },
        };
        Some((event, st))
    })
}
