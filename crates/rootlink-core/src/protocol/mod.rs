// ============================================
// File: crates/rootlink-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Collects the wire constants and tunables shared by both handshake
//! roles and by the framing layer.
//!
//! ## Main Functionality
//! - [`version`]: 1-byte protocol version handling
//! - [`wire`]: blocking read/write helpers for the handshake fields
//! - `ProtocolSettings`: per-node tunables (path length, step length, timeouts)
//!
//! ## Wire Summary
//! ```text
//! Version   guest → host : version (1)          host → guest : reply (1, 0 = ok)
//! Identity  sender → recv: DER certificate      recv → sender: reply (1, 0 = ok, else "send chain")
//!           [sender → recv: (path_length - 1) DER certificates, recv → sender: final reply (1)]
//! HalfKey   sender → recv: u16 BE length || RSA-OAEP ciphertext
//! Keys      sender → recv: 80 bytes AES-256-CTR ciphertext
//! Charset   guest → host : 1 byte code (first byte on the framed channel)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All multi-byte integers are big-endian
//! - Changing any size here is a protocol version bump
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod version;
pub mod wire;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

pub use version::{ProtocolVersion, CURRENT_PROTOCOL_VERSION};

// ============================================
// Constants
// ============================================

/// Distance in bytes between two framing control bytes.
pub const CONTROL_STEP: usize = 128;

/// Payload/padding bytes carried by one framing block (the rest is the control byte).
pub const BLOCK_PAYLOAD: usize = CONTROL_STEP - 1;

/// Length of the checkpoint digest (HMAC-SHA256).
pub const DIGEST_LEN: usize = 32;

/// Size of the ephemeral half-state key (cipher key + IV).
pub const HALF_STATE_KEY_LEN: usize = 48;

/// Size of the per-direction keys block (cipher key + IV + authentication key).
pub const KEYS_BLOCK_LEN: usize = 80;

/// AES-256 key size.
pub const CIPHER_KEY_LEN: usize = 32;

/// AES block-sized IV.
pub const CIPHER_IV_LEN: usize = 16;

/// HMAC key size.
pub const AUTH_KEY_LEN: usize = 32;

/// Default certificate path: end-point, regional, root-link, root.
pub const DEFAULT_PATH_LENGTH: usize = 4;

/// Largest DER certificate accepted on the wire.
pub const MAX_CERTIFICATE_LEN: usize = 16 * 1024;

/// Largest RSA ciphertext accepted during the half-key exchange (8192-bit modulus).
pub const MAX_WRAPPED_KEY_LEN: usize = 1024;

/// Reply byte meaning "accepted".
pub const REPLY_OK: u8 = 0x00;

/// Reply byte meaning "unknown certificate, send the chain".
pub const REPLY_SEND_CHAIN: u8 = 0x01;

/// Reply byte meaning "rejected".
pub const REPLY_REJECT: u8 = 0xFF;

// ============================================
// ProtocolSettings
// ============================================

/// Tunables agreed out-of-band by both endpoints.
///
/// `step_length` controls how often the writer emits a digest checkpoint;
/// `max_step_length` bounds how much unverified data a reader buffers
/// before giving up on the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// Protocol version sent by the guest and expected by the host.
    pub version: ProtocolVersion,
    /// Number of certificates in a complete chain, leaf included.
    pub path_length: usize,
    /// Bytes between digest checkpoints on the write side.
    pub step_length: usize,
    /// Maximum unverified bytes buffered on the read side.
    pub max_step_length: usize,
    /// Deadline applied to each blocking handshake read (`None` = infinite).
    pub initiation_timeout: Option<Duration>,
    /// Deadline applied to each blocking read once the session is ready.
    pub io_timeout: Option<Duration>,
}

impl ProtocolSettings {
    /// Converts a millisecond setting to a timeout, `0` meaning infinite.
    #[must_use]
    pub const fn timeout_from_millis(millis: u64) -> Option<Duration> {
        if millis == 0 {
            None
        } else {
            Some(Duration::from_millis(millis))
        }
    }

    /// Checks the internal consistency of the settings.
    ///
    /// # Errors
    /// `InvalidState` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.path_length < 2 {
            return Err(CoreError::invalid_state(
                "protocol.path_length",
                "at least 2 (end-point and anchor)",
            ));
        }
        if self.step_length < CONTROL_STEP {
            return Err(CoreError::invalid_state(
                "protocol.step_length",
                format!("at least {CONTROL_STEP}"),
            ));
        }
        if self.max_step_length < self.step_length + BLOCK_PAYLOAD {
            return Err(CoreError::invalid_state(
                "protocol.max_step_length",
                format!("at least step_length + {BLOCK_PAYLOAD}"),
            ));
        }
        Ok(())
    }
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            version: ProtocolVersion::current(),
            path_length: DEFAULT_PATH_LENGTH,
            step_length: 4096,
            max_step_length: 64 * 1024,
            initiation_timeout: Some(Duration::from_secs(10)),
            io_timeout: None,
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
    fn test_default_settings_valid() {
        assert!(ProtocolSettings::default().validate().is_ok());
    }

    #[test]
    fn test_reader_bound_must_cover_a_step() {
        let settings = ProtocolSettings {
            step_length: 4096,
            max_step_length: 4096,
            ..ProtocolSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(CoreError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_timeout_zero_is_infinite() {
        assert_eq!(ProtocolSettings::timeout_from_millis(0), None);
        assert_eq!(
            ProtocolSettings::timeout_from_millis(250),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_sizes_are_consistent() {
        assert_eq!(HALF_STATE_KEY_LEN, CIPHER_KEY_LEN + CIPHER_IV_LEN);
        assert_eq!(KEYS_BLOCK_LEN, HALF_STATE_KEY_LEN + AUTH_KEY_LEN);
        assert_eq!(BLOCK_PAYLOAD, 127);
    }
}
