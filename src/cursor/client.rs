use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::cursor::headers::build_headers;
use crate::errors::AppError;
use crate::protocol::{ChatRequest, ChatTurn, EncodedFrame, FrameDecoder};

pub const STREAM_CHAT_PATH: &str = "/aiserver.v1.AiService/StreamChat";

/// Fragments buffered between the body reader and the response writer.
const CHANNEL_CAPACITY: usize = 32;

pub type FragmentResult = Result<String, AppError>;

/// Ordered text fragments of one backend response.
///
/// Ends with `None` on completion, cancellation or timeout; a transport
/// failure is delivered once as `Some(Err(_))` before the end. Dropping the
/// stream stops the reader task and closes the upstream body.
pub struct FragmentStream {
    rx: mpsc::Receiver<FragmentResult>,
    _cancel_on_drop: DropGuard,
}

impl FragmentStream {
    /// Binds `rx` to `cancel`: dropping the stream cancels the token.
    pub(crate) fn from_parts(rx: mpsc::Receiver<FragmentResult>, cancel: CancellationToken) -> Self {
        Self { rx, _cancel_on_drop: cancel.drop_guard() }
    }

    pub async fn next(&mut self) -> Option<FragmentResult> {
        self.rx.recv().await
    }

    /// Concatenates every fragment, failing on the first transport error.
    pub async fn collect_text(mut self) -> Result<String, AppError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

/// Sends chat requests to the backend and streams the decoded answer back.
/// The underlying HTTP client is shared by every request.
#[derive(Clone)]
pub struct CursorClient {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl CursorClient {
    pub fn new(config: Arc<Config>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(AppError::transport)?;
        Ok(Self { http, config })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}{STREAM_CHAT_PATH}",
            self.config.cursor_api_url.trim_end_matches('/')
        )
    }

    /// Encodes `turns`, posts them, and returns the response as a stream of
    /// fragments once the backend has answered `200 OK`.
    ///
    /// `cancel` aborts the call at any point; before the response arrives it
    /// yields an already-finished stream, afterwards it ends the stream.
    pub async fn stream_chat(
        &self,
        turns: Vec<ChatTurn>,
        model: &str,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, AppError> {
        let trace_id = Uuid::new_v4().to_string();
        let headers = build_headers(&self.config, &trace_id)?;

        let payload = ChatRequest::new(turns, model, &self.config.cursor_working_dir, &trace_id).encode();
        let frame = EncodedFrame::wrap(&payload).map_err(|e| AppError::Unexpected(e.to_string()))?;
        debug!(%trace_id, model, payload_len = frame.payload_len(), "sending StreamChat request");

        let cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let deadline = Instant::now() + self.config.timeout;

        let send = self
            .http
            .post(self.endpoint())
            .headers(headers)
            .body(frame.into_bytes())
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%trace_id, "cancelled before the backend answered");
                return Ok(FragmentStream::from_parts(rx, cancel.clone()));
            }
            sent = tokio::time::timeout_at(deadline, send) => match sent {
                Err(_) => {
                    error!(%trace_id, "backend did not answer in time");
                    return Err(AppError::UpstreamTimeout { timeout: self.config.timeout });
                }
                Ok(Err(e)) => {
                    error!(%trace_id, "StreamChat request failed: {e}");
                    return Err(AppError::transport(e));
                }
                Ok(Ok(response)) => response,
            },
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = tokio::time::timeout_at(deadline, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            let message = match body.trim() {
                "" => format!("HTTP {}", status.as_u16()),
                trimmed => trimmed.to_string(),
            };
            error!(%trace_id, status = status.as_u16(), "backend rejected request: {message}");
            return Err(AppError::Upstream { status: status.as_u16(), message });
        }

        tokio::spawn(pump_fragments(response.bytes_stream(), tx, cancel.clone(), deadline));
        Ok(FragmentStream::from_parts(rx, cancel))
    }
}

/// Reads `body` until it ends, decoding fragments into `tx`.
///
/// Returns on end of stream, cancellation, deadline, a closed receiver, or
/// after forwarding a single read error. Dropping `body` and `tx` on return
/// closes the upstream connection and the consumer's queue.
async fn pump_fragments<S, E>(
    body: S,
    tx: mpsc::Sender<FragmentResult>,
    cancel: CancellationToken,
    deadline: Instant,
) where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    tokio::pin!(body);
    let mut decoder = FrameDecoder::new();
    let mut emitted = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(emitted, "response stream cancelled");
                return;
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!(emitted, "response stream hit the configured timeout");
                return;
            }
            next = body.next() => next,
        };

        match next {
            None => {
                debug!(
                    emitted,
                    leftover = decoder.buffered(),
                    state = ?decoder.state(),
                    "response stream finished"
                );
                return;
            }
            Some(Err(e)) => {
                error!(emitted, "error reading response stream: {e}");
                forward(&tx, &cancel, Err(AppError::transport(e))).await;
                return;
            }
            Some(Ok(chunk)) => {
                for fragment in decoder.feed(&chunk) {
                    if !forward(&tx, &cancel, Ok(fragment)).await {
                        return;
                    }
                    emitted += 1;
                }
            }
        }
    }
}

/// Blocks on the bounded queue unless cancelled. `false` means stop.
async fn forward(
    tx: &mpsc::Sender<FragmentResult>,
    cancel: &CancellationToken,
    item: FragmentResult,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}
