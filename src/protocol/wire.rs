use bytes::{BufMut, Bytes, BytesMut};

/// Wire type carried in the low three bits of every tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    LengthDelimited = 2,
}

/// Append-only writer for length-delimited binary messages.
///
/// Every `put_*` field helper follows the "write only if set" rule of the
/// backend format: empty strings, empty byte blocks and zero integers are
/// left out entirely. Nested messages are the exception and are always
/// written, even when their body is empty.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unsigned LEB128: seven bits per byte, low group first, high bit set
    /// on every byte but the last.
    pub fn put_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8(value as u8 | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub fn put_tag(&mut self, field: u32, wire_type: WireType) {
        self.put_varint((u64::from(field) << 3) | wire_type as u64);
    }

    pub fn put_string(&mut self, field: u32, value: &str) {
        self.put_bytes(field, value.as_bytes());
    }

    pub fn put_bytes(&mut self, field: u32, value: &[u8]) {
        if value.is_empty() {
            return;
        }
        self.put_length_delimited(field, value);
    }

    pub fn put_uint64(&mut self, field: u32, value: u64) {
        if value == 0 {
            return;
        }
        self.put_tag(field, WireType::Varint);
        self.put_varint(value);
    }

    pub fn put_message(&mut self, field: u32, body: &[u8]) {
        self.put_length_delimited(field, body);
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    fn put_length_delimited(&mut self, field: u32, body: &[u8]) {
        self.put_tag(field, WireType::LengthDelimited);
        self.put_varint(body.len() as u64);
        self.buf.put_slice(body);
    }
}


#[cfg(test)]
mod tests {
    use super::inspect::{decode_varint, MAX_VARINT_BYTES};
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.put_varint(value);
        w.finish().to_vec()
    }

    #[test]
    fn varint_boundaries() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(127), vec![0x7F]);
        assert_eq!(encode(128), vec![0x80, 0x01]);
        assert_eq!(encode(300), vec![0xAC, 0x02]);
        assert_eq!(encode(16384), vec![0x80, 0x80, 0x01]);
        assert_eq!(encode(u64::MAX).len(), MAX_VARINT_BYTES);
    }

    #[test]
    fn decode_reads_back_large_values() {
        for value in [u64::from(u32::MAX), u64::MAX] {
            let bytes = encode(value);
            assert_eq!(decode_varint(&bytes), Some((value, bytes.len())));
        }
    }

    #[test]
    fn multi_byte_tags_match_known_backend_bytes() {
        let cases: [(u32, WireType, &[u8]); 6] = [
            (2, WireType::LengthDelimited, &[0x12]),
            (15, WireType::LengthDelimited, &[0x7A]),
            (16, WireType::Varint, &[0x80, 0x01]),
            (22, WireType::Varint, &[0xB0, 0x01]),
            (28, WireType::Varint, &[0xE0, 0x01]),
            (29, WireType::Varint, &[0xE8, 0x01]),
        ];
        for (field, wire_type, expected) in cases {
            let mut w = WireWriter::new();
            w.put_tag(field, wire_type);
            assert_eq!(w.finish().as_ref(), expected, "field {field}");
        }
    }

    #[test]
    fn unset_scalars_are_omitted() {
        let mut w = WireWriter::new();
        w.put_string(1, "");
        w.put_bytes(4, &[]);
        w.put_uint64(13, 0);
        assert!(w.finish().is_empty());
    }

    #[test]
    fn empty_nested_message_is_still_written() {
        let mut w = WireWriter::new();
        w.put_message(7, &[]);
        assert_eq!(w.finish().as_ref(), &[0x3A, 0x00]);
    }

    #[test]
    fn string_field_is_tag_length_bytes() {
        let mut w = WireWriter::new();
        w.put_string(1, "hi");
        w.put_uint64(2, 1);
        assert_eq!(w.finish().as_ref(), &[0x0A, 0x02, b'h', b'i', 0x10, 0x01]);
    }

    #[test]
    fn long_strings_get_multi_byte_lengths() {
        let text = "x".repeat(200);
        let mut w = WireWriter::new();
        w.put_string(1, &text);
        let out = w.finish();
        assert_eq!(&out[..3], &[0x0A, 0xC8, 0x01]);
        assert_eq!(out.len(), 3 + 200);
    }
}
