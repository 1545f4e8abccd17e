//! Console codec implementation using tokio-util.
//!
//! This module provides [`ConsoleCodec`], which implements both the `Encoder`
//! and `Decoder` traits from tokio-util for the device console.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::TransportError;

/// Codec for the line oriented device console.
///
/// Incoming data has no framing at all, so the decoder yields whatever text
/// is available as one chunk. A multi-byte UTF-8 sequence split across two
/// reads is held back until the rest of it arrives; invalid bytes are
/// replaced rather than rejected.
///
/// Outgoing commands are written as `command\r\n`.
#[derive(Debug, Clone, Default)]
pub struct ConsoleCodec {
    _priv: (),
}

impl ConsoleCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ConsoleCodec {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let complete = complete_prefix_len(src);
        if complete == 0 {
            return Ok(None);
        }

        let chunk = src.split_to(complete);
        Ok(Some(String::from_utf8_lossy(&chunk).into_owned()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        // a truncated sequence will never be completed now
        let chunk = src.split();
        Ok(Some(String::from_utf8_lossy(&chunk).into_owned()))
    }
}

impl Encoder<String> for ConsoleCodec {
    type Error = TransportError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + 2);
        dst.put_slice(item.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Length of the longest prefix of `buf` that does not end part way through
/// a UTF-8 sequence.
fn complete_prefix_len(buf: &[u8]) -> usize {
    let mut offset = 0;
    loop {
        match std::str::from_utf8(&buf[offset..]) {
            Ok(_) => return buf.len(),
            Err(e) => match e.error_len() {
                Some(invalid) => offset += e.valid_up_to() + invalid,
                None => return offset + e.valid_up_to(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_plain_text() {
        let mut codec = ConsoleCodec::new();
        let mut buf = BytesMut::from("Brightscript Debugger> ");

        let chunk = codec.decode(&mut buf).unwrap();
        assert_eq!(chunk.as_deref(), Some("Brightscript Debugger> "));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_empty_buffer() {
        let mut codec = ConsoleCodec::new();
        let mut buf = BytesMut::new();

        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_holds_back_split_sequence() {
        let mut codec = ConsoleCodec::new();
        // "é" is 0xC3 0xA9
        let mut buf = BytesMut::from(&b"caf\xC3"[..]);

        let first = codec.decode(&mut buf).unwrap();
        assert_eq!(first.as_deref(), Some("caf"));
        assert_eq!(&buf[..], b"\xC3");

        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_slice(b"\xA9!");
        let second = codec.decode(&mut buf).unwrap();
        assert_eq!(second.as_deref(), Some("é!"));
    }

    #[test]
    fn decode_replaces_invalid_bytes() {
        let mut codec = ConsoleCodec::new();
        let mut buf = BytesMut::from(&b"a\xFFb"[..]);

        let chunk = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(chunk, "a\u{FFFD}b");
    }

    #[test]
    fn decode_eof_flushes_truncated_sequence() {
        let mut codec = ConsoleCodec::new();
        let mut buf = BytesMut::from(&b"\xC3"[..]);

        let chunk = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(chunk, "\u{FFFD}");
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_appends_crlf() {
        let mut codec = ConsoleCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("bt".to_string(), &mut buf).unwrap();

        assert_eq!(&buf[..], b"bt\r\n");
    }
}
