// ============================================
// File: crates/rootlink-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines the failure taxonomy of the secure transport: cryptographic
//! failures, protocol violations, trust rejections and framing faults.
//!
//! ## Main Functionality
//! - `CoreError`: Primary error enum for core operations
//! - Classification helpers (`is_crypto_error`, `is_trust_error`, ...)
//! - `From<std::io::Error>` that recovers framing faults carried inside
//!   I/O errors raised by the framing `Read`/`Write` implementations
//!
//! ## Error Categories
//! 1. **Crypto Errors**: key handling, RSA wrapping, decryption
//! 2. **Protocol Errors**: version mismatch, malformed or oversized fields
//! 3. **Trust Errors**: unknown certificate, invalid chain, store access
//! 4. **Framing Errors**: digest mismatch, truncated checkpoint
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material or salts in error messages
//! - Every variant is fatal to the session that raised it
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;

use thiserror::Error;

use rootlink_common::error::CommonError;
use rootlink_common::Alias;

use crate::framing::FramingFault;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for protocol, cryptographic and trust operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Failed to generate cryptographic key.
    #[error("Key generation failed: {context}")]
    KeyGeneration {
        /// What key was being generated
        context: String,
    },

    /// A key could not be parsed or serialized.
    #[error("Invalid key encoding: {context}")]
    KeyFormat {
        /// Which key and why
        context: String,
    },

    /// Encryption operation failed.
    #[error("Encryption failed: {context}")]
    Encryption {
        /// What was being encrypted
        context: String,
    },

    /// Decryption of a wrapped key failed.
    #[error("Decryption failed")]
    Decryption,

    // ========================================
    // Protocol Errors
    // ========================================

    /// Peer speaks a different protocol version.
    #[error("Unsupported protocol version: {got}, expected {expected}")]
    UnsupportedVersion {
        /// Version received
        got: u8,
        /// Version expected
        expected: u8,
    },

    /// Peer refused a handshake step with a non-zero reply byte.
    #[error("Peer rejected {step} (reply 0x{reply:02x})")]
    Rejected {
        /// Handshake step that was refused
        step: &'static str,
        /// Reply byte received
        reply: u8,
    },

    /// Message is malformed or truncated.
    #[error("Malformed message: {reason}")]
    MalformedMessage {
        /// What's wrong with the message
        reason: String,
    },

    /// Message exceeds maximum allowed size.
    #[error("Message too large: max {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Maximum allowed size
        max: usize,
        /// Actual size announced
        actual: usize,
    },

    /// Operation not valid in current state.
    #[error("Invalid state for operation: {operation} requires {required_state}")]
    InvalidState {
        /// What operation was attempted
        operation: String,
        /// What state was required
        required_state: String,
    },

    // ========================================
    // Trust Errors
    // ========================================

    /// Certificate could not be parsed.
    #[error("Invalid certificate: {reason}")]
    Certificate {
        /// Parser diagnostic
        reason: String,
    },

    /// No cached trust exists for this certificate.
    #[error("Untrusted certificate {alias}")]
    UntrustedCertificate {
        /// Alias of the rejected certificate
        alias: Alias,
    },

    /// Presented chain does not lead to the pinned anchor.
    #[error("Invalid certificate chain: {reason}")]
    InvalidChain {
        /// Which link failed
        reason: String,
    },

    /// The persisted trust store failed.
    #[error("Trust store error: {reason}")]
    Store {
        /// Underlying failure
        reason: String,
    },

    // ========================================
    // Framing Errors
    // ========================================

    /// Framing layer detected tampering or truncation.
    #[error(transparent)]
    Framing(#[from] FramingFault),

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Underlying connection failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `KeyGeneration` error.
    pub fn key_generation(context: impl Into<String>) -> Self {
        Self::KeyGeneration {
            context: context.into(),
        }
    }

    /// Creates a `KeyFormat` error.
    pub fn key_format(context: impl Into<String>) -> Self {
        Self::KeyFormat {
            context: context.into(),
        }
    }

    /// Creates a `MalformedMessage` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Creates a `Certificate` error.
    pub fn certificate(reason: impl Into<String>) -> Self {
        Self::Certificate {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidChain` error.
    pub fn invalid_chain(reason: impl Into<String>) -> Self {
        Self::InvalidChain {
            reason: reason.into(),
        }
    }

    /// Creates a `Store` error.
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidState` error.
    pub fn invalid_state(
        operation: impl Into<String>,
        required_state: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            required_state: required_state.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this is a cryptographic error.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::KeyGeneration { .. }
                | Self::KeyFormat { .. }
                | Self::Encryption { .. }
                | Self::Decryption
        )
    }

    /// Returns `true` if the peer's identity was refused.
    #[must_use]
    pub const fn is_trust_error(&self) -> bool {
        matches!(
            self,
            Self::Certificate { .. }
                | Self::UntrustedCertificate { .. }
                | Self::InvalidChain { .. }
        )
    }

    /// Returns `true` if this error might indicate an attack.
    ///
    /// These errors warrant a `warn!` rather than a `debug!`.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::Decryption | Self::InvalidChain { .. } | Self::Framing(FramingFault::Tampered)
        )
    }
}

impl From<io::Error> for CoreError {
    fn from(err: io::Error) -> Self {
        let fault = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<FramingFault>())
            .copied();
        match fault {
            Some(fault) => Self::Framing(fault),
            None => Self::Io(err),
        }
    }
}

// ============================================
// Tests
// ============================================
