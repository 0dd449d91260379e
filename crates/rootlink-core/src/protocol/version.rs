// ============================================
// File: crates/rootlink-core/src/protocol/version.rs
// ============================================
//! # Protocol Versioning
//!
//! ## Creation Reason
//! The very first handshake byte is the guest's protocol version; the
//! host confirms with `0x00` or closes. This module owns that check.
//!
//! ## Version History
//! | Version | Description |
//! |---------|-------------|
//! | 0x01    | RSA-OAEP half keys, AES-256-CTR, HMAC-SHA256 checkpoints |
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALWAYS increment the version for wire format changes
//! - There is no negotiation: versions must match exactly
//!
//! ## Last Modified
//! v0.1.0 - Initial version definitions

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Current protocol version.
pub const CURRENT_PROTOCOL_VERSION: u8 = 0x01;

/// Protocol version identifier.
///
/// # Example
/// ```
/// use rootlink_core::protocol::ProtocolVersion;
///
/// let ours = ProtocolVersion::current();
/// assert!(ours.accept(0x01).is_ok());
/// assert!(ours.accept(0x02).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(u8);

impl ProtocolVersion {
    /// Creates a new protocol version.
    #[must_use]
    pub const fn new(version: u8) -> Self {
        Self(version)
    }

    /// Returns the current protocol version.
    #[must_use]
    pub const fn current() -> Self {
        Self(CURRENT_PROTOCOL_VERSION)
    }

    /// Returns the raw version number.
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// Checks a version byte received from a guest against ours.
    ///
    /// # Errors
    /// `UnsupportedVersion` unless the versions match exactly.
    pub fn accept(&self, received: u8) -> Result<()> {
        if received == self.0 {
            Ok(())
        } else {
            Err(CoreError::UnsupportedVersion {
                got: received,
                expected: self.0,
            })
        }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

impl From<u8> for ProtocolVersion {
    fn from(version: u8) -> Self {
        Self(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_version() {
        assert_eq!(ProtocolVersion::current().as_u8(), CURRENT_PROTOCOL_VERSION);
        assert_eq!(ProtocolVersion::default(), ProtocolVersion::current());
    }

    #[test]
    fn test_mismatch_rejected() {
        let host = ProtocolVersion::new(0x01);
        assert!(host.accept(0x01).is_ok());
        assert!(matches!(
            host.accept(0x02),
            Err(CoreError::UnsupportedVersion { got: 0x02, expected: 0x01 })
        ));
    }

    #[test]
    fn test_version_display() {
        assert_eq!(ProtocolVersion::new(0x01).to_string(), "0x01");
    }
}
