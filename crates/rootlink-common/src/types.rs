// ============================================
// File: crates/rootlink-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the identifiers that cross crate boundaries: the alias
//! under which a certificate is cached, and the charset negotiated for
//! text inside marshalled records.
//!
//! ## Main Functionality
//! - `Alias`: stable 32-byte certificate fingerprint, rendered as lowercase hex
//! - `Charset`: 1-byte wire code for the record text encoding
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Alias` text form is the key of persisted trust records; never change it
//! - Charset wire codes are part of the protocol; append, never renumber
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};

// ============================================
// Constants
// ============================================

/// Size of the digest an alias is built from.
pub const ALIAS_DIGEST_SIZE: usize = 32;

// ============================================
// Alias
// ============================================

/// Stable identifier of a certificate inside the trust cache.
///
/// The alias is the SHA-256 fingerprint of the certificate DER; the digest
/// itself is computed by `rootlink-core` so this crate stays free of
/// cryptographic dependencies.
///
/// # Example
/// ```
/// use rootlink_common::types::Alias;
///
/// let alias = Alias::from_digest([0xab; 32]);
/// let text = alias.to_string();
/// assert_eq!(text.len(), 64);
/// assert_eq!(text.parse::<Alias>().unwrap(), alias);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Alias([u8; ALIAS_DIGEST_SIZE]);

impl Alias {
    /// Wraps a raw fingerprint.
    #[must_use]
    pub const fn from_digest(digest: [u8; ALIAS_DIGEST_SIZE]) -> Self {
        Self(digest)
    }

    /// Returns the raw fingerprint bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ALIAS_DIGEST_SIZE] {
        &self.0
    }

    /// Short prefix suitable for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alias({}...)", self.short())
    }
}

impl FromStr for Alias {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| CommonError::invalid_input("alias", e.to_string()))?;
        let digest: [u8; ALIAS_DIGEST_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CommonError::invalid_length(ALIAS_DIGEST_SIZE, bytes.len()))?;
        Ok(Self(digest))
    }
}

impl Serialize for Alias {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Alias {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================
// Charset
// ============================================

/// Text encoding used by the record marshaller once the channel is up.
///
/// # Wire Codes
/// | Code | Charset  |
/// |------|----------|
/// | 0x00 | UTF-8    |
/// | 0x01 | UTF-16BE |
/// | 0x02 | UTF-16LE |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Charset {
    /// UTF-8 (default).
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    /// UTF-16, big-endian code units.
    #[serde(rename = "utf-16be")]
    Utf16Be,
    /// UTF-16, little-endian code units.
    #[serde(rename = "utf-16le")]
    Utf16Le,
}

impl Charset {
    /// Returns the 1-byte wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Utf8 => 0x00,
            Self::Utf16Be => 0x01,
            Self::Utf16Le => 0x02,
        }
    }

    /// Parses a wire code.
    ///
    /// # Errors
    /// `UnsupportedCharset` for codes this build does not know.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(Self::Utf8),
            0x01 => Ok(Self::Utf16Be),
            0x02 => Ok(Self::Utf16Le),
            other => Err(CommonError::UnsupportedCharset(format!("code 0x{other:02x}"))),
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16Be => "utf-16be",
            Self::Utf16Le => "utf-16le",
        }
    }

    /// Encodes text in this charset.
    #[must_use]
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        }
    }

    /// Decodes text previously produced by [`Charset::encode`].
    ///
    /// # Errors
    /// `Decoding` if the bytes are not valid in this charset.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| CommonError::decoding("utf-8 text", e.to_string())),
            Self::Utf16Be | Self::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(CommonError::decoding(
                        self.name(),
                        "odd number of bytes",
                    ));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| {
                        let pair = [pair[0], pair[1]];
                        if self == Self::Utf16Be {
                            u16::from_be_bytes(pair)
                        } else {
                            u16::from_le_bytes(pair)
                        }
                    })
                    .collect();
                String::from_utf16(&units)
                    .map_err(|e| CommonError::decoding(self.name(), e.to_string()))
            }
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Charset {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-16be" | "utf16be" => Ok(Self::Utf16Be),
            "utf-16le" | "utf16le" => Ok(Self::Utf16Le),
            _ => Err(CommonError::UnsupportedCharset(s.to_string())),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_text_roundtrip() {
        let alias = Alias::from_digest([0x5a; 32]);
        let parsed: Alias = alias.to_string().parse().unwrap();
        assert_eq!(alias, parsed);
        assert!(format!("{alias:?}").starts_with("Alias(5a5a"));
    }

    #[test]
    fn test_alias_rejects_wrong_length() {
        assert!(matches!(
            "abcd".parse::<Alias>(),
            Err(CommonError::InvalidLength { expected: 32, actual: 2 })
        ));
        assert!("zz".parse::<Alias>().is_err());
    }

    #[test]
    fn test_alias_serde_as_string() {
        let alias = Alias::from_digest([1; 32]);
        let json = serde_json::to_string(&alias).unwrap();
        assert_eq!(json, format!("\"{alias}\""));
    }

    #[test]
    fn test_charset_codes() {
        for charset in [Charset::Utf8, Charset::Utf16Be, Charset::Utf16Le] {
            assert_eq!(Charset::from_code(charset.code()).unwrap(), charset);
            assert_eq!(charset.name().parse::<Charset>().unwrap(), charset);
        }
        assert!(Charset::from_code(0x7f).is_err());
    }

    #[test]
    fn test_charset_text_encoding() {
        let text = "grüße, 世界";
        for charset in [Charset::Utf8, Charset::Utf16Be, Charset::Utf16Le] {
            let bytes = charset.encode(text);
            assert_eq!(charset.decode(&bytes).unwrap(), text);
        }
        assert_eq!(Charset::Utf16Be.encode("A"), vec![0x00, 0x41]);
        assert_eq!(Charset::Utf16Le.encode("A"), vec![0x41, 0x00]);
        assert!(Charset::Utf16Be.decode(&[0x00]).is_err());
    }
}
