use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

/// Four zero bytes mark the start of a candidate frame.
const DELIMITER: [u8; 4] = [0x00; 4];

/// Delimiter plus the three header bytes `b1 b2 b3`.
const HEADER_END: usize = DELIMITER.len() + 3;

/// Tag byte of the text content field (field 1, length-delimited).
const CONTENT_TAG: u8 = 0x0A;

/// Where the decoder is waiting for more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// No delimiter in the buffer.
    Idle,
    /// Delimiter found, header bytes not all present.
    PendingHeader,
    /// Header valid, payload bytes not all present.
    PendingPayload,
}

/// Outcome of one decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A complete payload was consumed from the buffer. May be empty.
    Fragment(Bytes),
    /// The first candidate delimiter was noise; its first byte and everything
    /// before it were dropped.
    Resync,
    /// Nothing can be decided without more input. Nothing was consumed.
    NeedMore,
}

/// Validates the three bytes that follow a delimiter.
///
/// Reverse-engineered from observed traffic: `b2` is the content tag and
/// `b1` looks like the low byte of the outer message length, which counts
/// the tag and length bytes on top of the `b3` payload bytes.
fn header_is_valid(b1: u8, b2: u8, b3: u8) -> bool {
    b2 == CONTENT_TAG && u16::from(b1) == u16::from(b3) + 2
}

/// Incremental, resynchronizing decoder for the backend's response stream.
///
/// Bytes may arrive split at any boundary; the sequence of fragments is the
/// same as if the whole stream had been fed at once. Spurious zero runs are
/// skipped rather than reported.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    /// Offsets below this are known not to start a delimiter.
    scanned: usize,
    state: DecoderState,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            scanned: 0,
            state: DecoderState::Idle,
        }
    }

    /// Appends `chunk` and drains every complete fragment, in stream order.
    /// Empty payloads are consumed without producing a fragment.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut fragments = Vec::new();
        loop {
            match self.step() {
                Step::Fragment(payload) => {
                    if !payload.is_empty() {
                        fragments.push(String::from_utf8_lossy(&payload).into_owned());
                    }
                }
                Step::Resync => continue,
                Step::NeedMore => break,
            }
        }
        fragments
    }

    /// Runs a single decode attempt against the buffered bytes.
    pub fn step(&mut self) -> Step {
        let found = self.buf[self.scanned..]
            .windows(DELIMITER.len())
            .position(|w| w == DELIMITER);
        let Some(pos) = found.map(|offset| self.scanned + offset) else {
            // Only the tail can still grow into a delimiter.
            self.scanned = self.buf.len().saturating_sub(DELIMITER.len() - 1);
            self.state = DecoderState::Idle;
            return Step::NeedMore;
        };
        self.scanned = pos;

        if self.buf.len() < pos + HEADER_END {
            self.state = DecoderState::PendingHeader;
            return Step::NeedMore;
        }

        let (b1, b2, b3) = (self.buf[pos + 4], self.buf[pos + 5], self.buf[pos + 6]);
        if !header_is_valid(b1, b2, b3) {
            trace!(offset = pos, b1, b2, b3, "skipping non-payload delimiter");
            self.buf.advance(pos + 1);
            self.scanned = 0;
            self.state = DecoderState::Idle;
            return Step::Resync;
        }

        let end = pos + HEADER_END + usize::from(b3);
        if self.buf.len() < end {
            self.state = DecoderState::PendingPayload;
            return Step::NeedMore;
        }

        let mut frame = self.buf.split_to(end);
        let payload = frame.split_off(pos + HEADER_END).freeze();
        self.scanned = 0;
        self.state = DecoderState::Idle;
        Step::Fragment(payload)
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Bytes held but not yet accounted for.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
