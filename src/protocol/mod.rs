//! Binary bridge to the backend's gRPC-Web/Connect chat endpoint.
//!
//! Outbound: [`request::ChatRequest::encode`] → [`envelope::EncodedFrame::wrap`].
//! Inbound: [`decoder::FrameDecoder`] turns the chunked response body back
//! into text fragments.

pub mod decoder;
pub mod envelope;
pub mod request;
pub mod wire;

pub use decoder::FrameDecoder;
pub use envelope::EncodedFrame;
pub use request::{ChatRequest, ChatTurn, WireRole};
