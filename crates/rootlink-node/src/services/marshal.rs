// ============================================
// File: crates/rootlink-node/src/services/marshal.rs
// ============================================
//! # Record Marshalling
//!
//! ## Creation Reason
//! Typed application records exchanged once a session is ready. Each
//! record type names itself with a constant kind, so reading is a typed
//! request instead of a dynamic lookup.
//!
//! ## Wire Format
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────┐
//! │ length (u32) │ {"kind": "...", "body": {...}} in the charset │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The length is in bytes of the encoded text, big-endian
//! - Records above `MAX_RECORD_LEN` are refused before allocating
//!
//! ## Last Modified
//! v0.1.0 - Initial JSON record marshalling

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use rootlink_common::Charset;
use rootlink_core::CoreError;

use crate::error::{NodeError, Result};

/// Largest encoded record accepted.
pub const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// A typed application record.
pub trait Record: Serialize + DeserializeOwned {
    /// Stable name carried on the wire.
    const KIND: &'static str;
}

/// Text message, the record used by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message text.
    pub text: String,
}

impl Message {
    /// Creates a message.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Record for Message {
    const KIND: &'static str = "message";
}

#[derive(Serialize)]
struct OutgoingEnvelope<'a, T> {
    kind: &'static str,
    body: &'a T,
}

#[derive(Deserialize)]
struct IncomingEnvelope {
    kind: String,
    body: serde_json::Value,
}

// ============================================
// RecordWriter
// ============================================

/// Writes records to a byte stream.
#[derive(Debug)]
pub struct RecordWriter<W> {
    inner: W,
    charset: Charset,
    closed: bool,
}

impl<W: Write> RecordWriter<W> {
    /// Creates a writer encoding text in `charset`.
    pub fn new(inner: W, charset: Charset) -> Self {
        Self {
            inner,
            charset,
            closed: false,
        }
    }

    /// Serializes `records` in order. Nothing is flushed.
    ///
    /// # Errors
    /// `SessionClosed` after `close`, `Marshal` or an I/O failure.
    pub fn write<R: Record>(&mut self, records: &[R]) -> Result<()> {
        if self.closed {
            return Err(NodeError::SessionClosed);
        }
        for record in records {
            let text = serde_json::to_string(&OutgoingEnvelope {
                kind: R::KIND,
                body: record,
            })
            .map_err(|e| NodeError::marshal(e.to_string()))?;
            let encoded = self.charset.encode(&text);
            let len = u32::try_from(encoded.len())
                .ok()
                .filter(|&len| len as usize <= MAX_RECORD_LEN)
                .ok_or(NodeError::RecordTooLarge {
                    max: MAX_RECORD_LEN,
                    actual: encoded.len(),
                })?;
            self.inner.write_all(&len.to_be_bytes())?;
            self.inner.write_all(&encoded)?;
            trace!(kind = R::KIND, len, "Record written");
        }
        Ok(())
    }

    /// Flushes buffered records to the peer.
    ///
    /// # Errors
    /// I/O failure.
    pub fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(NodeError::SessionClosed);
        }
        self.inner.flush()?;
        Ok(())
    }

    /// Flushes and refuses further writes. Idempotent.
    ///
    /// # Errors
    /// I/O failure on the final flush.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.inner.flush()?;
        Ok(())
    }

    /// The underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

// ============================================
// RecordReader
// ============================================

/// Reads records from a byte stream.
#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
    charset: Charset,
}

impl<R: Read> RecordReader<R> {
    /// Creates a reader decoding text in `charset`.
    pub fn new(inner: R, charset: Charset) -> Self {
        Self { inner, charset }
    }

    /// Reads the next record, which must be a `T`.
    ///
    /// # Errors
    /// - `PeerClosed` if the stream ends between records
    /// - `UnexpectedRecord` if the next record has another kind
    /// - `RecordTooLarge`, `Marshal` or an I/O failure
    pub fn read<T: Record>(&mut self) -> Result<T> {
        let mut len = [0u8; 4];
        if let Err(e) = self.inner.read_exact(&mut len) {
            return Err(match CoreError::from(e) {
                CoreError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    NodeError::PeerClosed
                }
                other => other.into(),
            });
        }
        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_RECORD_LEN {
            return Err(NodeError::RecordTooLarge {
                max: MAX_RECORD_LEN,
                actual: len,
            });
        }

        let mut encoded = vec![0u8; len];
        self.inner.read_exact(&mut encoded)?;
        let text = self.charset.decode(&encoded)?;
        let envelope: IncomingEnvelope =
            serde_json::from_str(&text).map_err(|e| NodeError::marshal(e.to_string()))?;
        if envelope.kind != T::KIND {
            return Err(NodeError::UnexpectedRecord {
                expected: T::KIND,
                actual: envelope.kind,
            });
        }
        trace!(kind = T::KIND, len, "Record read");
        serde_json::from_value(envelope.body).map_err(|e| NodeError::marshal(e.to_string()))
    }

    /// The underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
    }

    impl Record for Ping {
        const KIND: &'static str = "ping";
    }

    fn encode<R: Record>(charset: Charset, records: &[R]) -> Vec<u8> {
        let mut writer = RecordWriter::new(Vec::new(), charset);
        writer.write(records).unwrap();
        writer.close().unwrap();
        writer.get_ref().clone()
    }

    #[test]
    fn test_records_in_every_charset() {
        for charset in [Charset::Utf8, Charset::Utf16Be, Charset::Utf16Le] {
            let wire = encode(charset, &[Message::new("héllo"), Message::new("wörld")]);
            let mut reader = RecordReader::new(wire.as_slice(), charset);
            assert_eq!(reader.read::<Message>().unwrap().text, "héllo");
            assert_eq!(reader.read::<Message>().unwrap().text, "wörld");
            assert!(matches!(reader.read::<Message>(), Err(NodeError::PeerClosed)));
        }
    }

    #[test]
    fn test_utf16_doubles_ascii_length() {
        let utf8 = encode(Charset::Utf8, &[Ping { seq: 7 }]);
        let utf16 = encode(Charset::Utf16Be, &[Ping { seq: 7 }]);
        assert_eq!((utf8.len() - 4) * 2, utf16.len() - 4);
    }

    #[test]
    fn test_kind_mismatch() {
        let wire = encode(Charset::Utf8, &[Ping { seq: 1 }]);
        let mut reader = RecordReader::new(wire.as_slice(), Charset::Utf8);
        assert!(matches!(
            reader.read::<Message>(),
            Err(NodeError::UnexpectedRecord { expected: "message", ref actual }) if actual == "ping"
        ));
    }

    #[test]
    fn test_oversized_length_refused() {
        let wire = u32::MAX.to_be_bytes();
        let mut reader = RecordReader::new(&wire[..], Charset::Utf8);
        assert!(matches!(
            reader.read::<Ping>(),
            Err(NodeError::RecordTooLarge { .. })
        ));
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        let wire = encode(Charset::Utf8, &[Ping { seq: 1 }]);
        let mut reader = RecordReader::new(&wire[..wire.len() - 1], Charset::Utf8);
        assert!(matches!(reader.read::<Ping>(), Err(NodeError::Core(_))));
    }

    #[test]
    fn test_write_after_close() {
        let mut writer = RecordWriter::new(Vec::new(), Charset::Utf8);
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(matches!(
            writer.write(&[Ping { seq: 1 }]),
            Err(NodeError::SessionClosed)
        ));
    }
}
