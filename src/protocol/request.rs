use bytes::Bytes;
use uuid::Uuid;

use super::wire::WireWriter;

// ── Field numbers ─────────────────────────────────────────────────────────────

const TURN_TEXT: u32 = 1;
const TURN_ROLE: u32 = 2;
const TURN_MESSAGE_ID: u32 = 13;

const MODEL_NAME: u32 = 1;
const MODEL_OPAQUE_BYTES: u32 = 4;

const REQUEST_TURNS: u32 = 2;
const REQUEST_OPAQUE_BYTES: u32 = 4;
const REQUEST_WORKING_DIR: u32 = 5;
const REQUEST_MODEL: u32 = 7;
const REQUEST_TRACE_ID: u32 = 9;
const REQUEST_CONVERSATION_ID: u32 = 15;

// ── Opaque protocol constants ─────────────────────────────────────────────────
//
// Semantics unknown. The backend rejects requests that do not carry these
// exact values; zero means "absent" on the wire.

/// (field number, value) pairs written after the trace id.
const OPAQUE_BEFORE_CONVERSATION: [(u32, u64); 2] = [(13, 0), (14, 0)];
/// Field 16 must be `1` for the request to be accepted.
const OPAQUE_AFTER_CONVERSATION: [(u32, u64); 5] = [(16, 1), (22, 0), (24, 0), (28, 0), (29, 0)];

/// The backend only distinguishes two speaker roles. Assistant and system
/// turns share `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum WireRole {
    User = 1,
    Other = 2,
}

impl WireRole {
    /// Maps an OpenAI-style role name onto the backend role.
    pub fn from_role_name(role: &str) -> Self {
        if role.eq_ignore_ascii_case("assistant") || role.eq_ignore_ascii_case("system") {
            WireRole::Other
        } else {
            WireRole::User
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: WireRole,
    pub text: String,
}

impl ChatTurn {
    pub fn new(role: WireRole, text: impl Into<String>) -> Self {
        Self { role, text: text.into() }
    }
}

/// A chat request as the backend receives it.
///
/// Built once per outbound call; every turn shares `message_id`.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub turns: Vec<ChatTurn>,
    pub working_dir: String,
    pub model: String,
    pub trace_id: String,
    pub conversation_id: String,
    pub message_id: String,
}

impl ChatRequest {
    /// Creates a request with freshly generated conversation and message ids.
    pub fn new(
        turns: Vec<ChatTurn>,
        model: impl Into<String>,
        working_dir: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            turns,
            working_dir: working_dir.into(),
            model: model.into(),
            trace_id: trace_id.into(),
            conversation_id: Uuid::new_v4().to_string(),
            message_id: Uuid::new_v4().to_string(),
        }
    }

    /// Replaces the generated identifiers, for reproducible encodings.
    #[cfg(test)]
    pub fn with_ids(
        mut self,
        trace_id: impl Into<String>,
        conversation_id: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        self.trace_id = trace_id.into();
        self.conversation_id = conversation_id.into();
        self.message_id = message_id.into();
        self
    }

    /// Encodes the request into the backend's binary layout.
    ///
    /// The field order below is the order the backend's own client emits and
    /// must not be rearranged.
    pub fn encode(&self) -> Bytes {
        let mut w = WireWriter::new();

        for turn in &self.turns {
            let block = encode_turn(turn, &self.message_id);
            w.put_message(REQUEST_TURNS, &block);
        }
        w.put_bytes(REQUEST_OPAQUE_BYTES, &[]);
        w.put_string(REQUEST_WORKING_DIR, &self.working_dir);
        w.put_message(REQUEST_MODEL, &encode_model(&self.model));
        w.put_string(REQUEST_TRACE_ID, &self.trace_id);
        for (field, value) in OPAQUE_BEFORE_CONVERSATION {
            w.put_uint64(field, value);
        }
        w.put_string(REQUEST_CONVERSATION_ID, &self.conversation_id);
        for (field, value) in OPAQUE_AFTER_CONVERSATION {
            w.put_uint64(field, value);
        }

        w.finish()
    }
}

fn encode_turn(turn: &ChatTurn, message_id: &str) -> Bytes {
    let mut w = WireWriter::new();
    w.put_string(TURN_TEXT, &turn.text);
    w.put_uint64(TURN_ROLE, turn.role as u64);
    w.put_string(TURN_MESSAGE_ID, message_id);
    w.finish()
}

fn encode_model(model: &str) -> Bytes {
    let mut w = WireWriter::new();
    w.put_string(MODEL_NAME, model);
    w.put_bytes(MODEL_OPAQUE_BYTES, &[]);
    w.finish()
}
