// ============================================
// File: crates/rootlink-core/src/protocol/wire.rs
// ============================================
//! # Handshake Wire Helpers
//!
//! ## Creation Reason
//! The handshake is a strictly sequential exchange of small fields over a
//! blocking connection. These helpers read and write those fields and
//! enforce their size limits before anything is allocated.
//!
//! ## Parsing Strategy
//! 1. Read the fixed-size header (length prefix or DER tag/length)
//! 2. Reject announced sizes above the caller's maximum
//! 3. Read exactly the announced body
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always validate announced lengths before allocating
//! - Certificates are sent as bare DER; the DER header is the framing
//!
//! ## Last Modified
//! v0.1.0 - Initial wire helpers

use std::io::{Read, Write};

use crate::error::{CoreError, Result};

/// DER tag of a SEQUENCE (every X.509 certificate starts with one).
const DER_SEQUENCE: u8 = 0x30;

// ============================================
// Single bytes
// ============================================

/// Reads one byte.
///
/// # Errors
/// I/O failure or end of stream.
pub fn read_u8<R: Read + ?Sized>(reader: &mut R) -> Result<u8> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    Ok(byte[0])
}

/// Writes one byte and flushes it.
///
/// # Errors
/// I/O failure.
pub fn write_u8<W: Write + ?Sized>(writer: &mut W, value: u8) -> Result<()> {
    writer.write_all(&[value])?;
    writer.flush()?;
    Ok(())
}

/// Reads exactly `N` bytes.
///
/// # Errors
/// I/O failure or end of stream.
pub fn read_array<R: Read + ?Sized, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

// ============================================
// Length-prefixed blobs
// ============================================

/// Writes a `u16` big-endian length followed by `payload`.
///
/// # Errors
/// `MessageTooLarge` if the payload does not fit the prefix.
pub fn write_len_prefixed<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u16::try_from(payload.len()).map_err(|_| CoreError::MessageTooLarge {
        max: usize::from(u16::MAX),
        actual: payload.len(),
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads a `u16` big-endian length followed by that many bytes.
///
/// # Errors
/// - `MalformedMessage` for a zero length
/// - `MessageTooLarge` if the length exceeds `max`
pub fn read_len_prefixed<R: Read + ?Sized>(reader: &mut R, max: usize) -> Result<Vec<u8>> {
    let len = usize::from(u16::from_be_bytes(read_array::<_, 2>(reader)?));
    if len == 0 {
        return Err(CoreError::malformed("zero length prefix"));
    }
    if len > max {
        return Err(CoreError::MessageTooLarge { max, actual: len });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

// ============================================
// DER certificates
// ============================================

/// Writes a DER certificate as-is and flushes.
///
/// # Errors
/// I/O failure.
pub fn write_der<W: Write + ?Sized>(writer: &mut W, der: &[u8]) -> Result<()> {
    writer.write_all(der)?;
    writer.flush()?;
    Ok(())
}

/// Reads one DER-encoded SEQUENCE (a certificate) from the stream.
///
/// Only definite-length encodings are accepted, as DER requires.
///
/// # Errors
/// - `MalformedMessage` for a non-SEQUENCE tag or indefinite length
/// - `MessageTooLarge` if the encoded size exceeds `max`
pub fn read_der<R: Read + ?Sized>(reader: &mut R, max: usize) -> Result<Vec<u8>> {
    let tag = read_u8(reader)?;
    if tag != DER_SEQUENCE {
        return Err(CoreError::malformed(format!(
            "expected DER SEQUENCE, got tag 0x{tag:02x}"
        )));
    }

    let first = read_u8(reader)?;
    let mut header = vec![tag, first];
    let body_len = if first < 0x80 {
        usize::from(first)
    } else {
        let octets = usize::from(first & 0x7F);
        if octets == 0 || octets > 4 {
            return Err(CoreError::malformed("unsupported DER length encoding"));
        }
        let mut len = 0usize;
        for _ in 0..octets {
            let byte = read_u8(reader)?;
            header.push(byte);
            len = (len << 8) | usize::from(byte);
        }
        len
    };

    let total = header.len() + body_len;
    if total > max {
        return Err(CoreError::MessageTooLarge { max, actual: total });
    }

    let mut der = header;
    der.resize(total, 0);
    let start = total - body_len;
    reader.read_exact(&mut der[start..])?;
    Ok(der)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_len_prefixed_roundtrip() {
        let mut buf = Vec::new();
        write_len_prefixed(&mut buf, &[7u8; 300]).unwrap();
        assert_eq!(&buf[..2], &[0x01, 0x2c]);

        let payload = read_len_prefixed(&mut Cursor::new(buf), 512).unwrap();
        assert_eq!(payload, vec![7u8; 300]);
    }

    #[test]
    fn test_len_prefixed_limits() {
        let zero = [0u8, 0u8];
        assert!(matches!(
            read_len_prefixed(&mut Cursor::new(zero), 16),
            Err(CoreError::MalformedMessage { .. })
        ));

        let huge = [0xffu8, 0xff];
        assert!(matches!(
            read_len_prefixed(&mut Cursor::new(huge), 16),
            Err(CoreError::MessageTooLarge { max: 16, actual: 65535 })
        ));
    }

    #[test]
    fn test_truncated_prefixed_body_is_io_error() {
        let truncated = [0x00u8, 0x10, 1, 2, 3];
        assert!(matches!(
            read_len_prefixed(&mut Cursor::new(truncated), 64),
            Err(CoreError::Io(_))
        ));
    }

    #[test]
    fn test_read_der_short_and_long_form() {
        let short = [0x30, 0x03, 0x02, 0x01, 0x05, 0xAA];
        let mut cursor = Cursor::new(short);
        assert_eq!(read_der(&mut cursor, 64).unwrap(), &short[..5]);
        // trailing byte left for the next field
        assert_eq!(read_u8(&mut cursor).unwrap(), 0xAA);

        let mut long = vec![0x30, 0x82, 0x01, 0x00];
        long.extend(std::iter::repeat(0x11).take(256));
        let der = read_der(&mut Cursor::new(long.clone()), 1024).unwrap();
        assert_eq!(der, long);
    }

    #[test]
    fn test_read_der_rejects_bad_input() {
        assert!(read_der(&mut Cursor::new([0x04, 0x00]), 64).is_err());
        assert!(read_der(&mut Cursor::new([0x30, 0x80]), 64).is_err());
        assert!(matches!(
            read_der(&mut Cursor::new([0x30, 0x82, 0x40, 0x00]), 1024),
            Err(CoreError::MessageTooLarge { .. })
        ));
    }
}
