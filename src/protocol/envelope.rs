use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Flag byte (1) + big-endian payload length (4).
pub const ENVELOPE_HEADER_LEN: usize = 5;

/// The only flag value ever sent: payload is not compressed.
pub const FLAG_UNCOMPRESSED: u8 = 0x00;

#[derive(Debug, Error)]
#[error("payload of {len} bytes does not fit a 32-bit envelope length")]
pub struct FrameTooLarge {
    pub len: usize,
}

/// One outbound message wrapped as `[flag][u32 BE length][payload]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame(Bytes);

impl EncodedFrame {
    pub fn wrap(payload: &[u8]) -> Result<Self, FrameTooLarge> {
        let len = u32::try_from(payload.len()).map_err(|_| FrameTooLarge { len: payload.len() })?;

        let mut buf = BytesMut::with_capacity(ENVELOPE_HEADER_LEN + payload.len());
        buf.put_u8(FLAG_UNCOMPRESSED);
        buf.put_u32(len);
        buf.put_slice(payload);
        Ok(Self(buf.freeze()))
    }

    pub fn payload_len(&self) -> usize {
        self.0.len() - ENVELOPE_HEADER_LEN
    }

    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}
