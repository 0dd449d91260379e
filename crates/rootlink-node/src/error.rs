// ============================================
// File: crates/rootlink-node/src/error.rs
// ============================================
//! # Node Error Types
//!
//! ## Creation Reason
//! Top-level error of the node crate: configuration problems, session
//! lifecycle misuse and record marshalling, wrapping the errors of the
//! lower crates.
//!
//! ## ⚠️ Important Note for Next Developer
//! - I/O errors are routed through `CoreError` so framing faults keep
//!   their type
//! - Every session error is fatal; nothing here is retried internally
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;

use thiserror::Error;

use rootlink_common::error::CommonError;
use rootlink_core::error::CoreError;
use rootlink_transport::error::TransportError;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Node error types.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// File that failed
        path: String,
        /// Parser or I/O diagnostic
        reason: String,
    },

    /// Configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Operation on a session that has been closed.
    #[error("Session is closed")]
    SessionClosed,

    /// Operation on a session that failed earlier.
    #[error("Session failed earlier and is no longer usable")]
    SessionFailed,

    /// The peer closed the channel between two records.
    #[error("Peer closed the connection")]
    PeerClosed,

    /// A record of another type was received.
    #[error("Unexpected record: expected '{expected}', got '{actual}'")]
    UnexpectedRecord {
        /// Kind requested by the caller
        expected: &'static str,
        /// Kind found on the wire
        actual: String,
    },

    /// A record announced a length above the limit.
    #[error("Record too large: max {max} bytes, got {actual}")]
    RecordTooLarge {
        /// Largest accepted record
        max: usize,
        /// Announced length
        actual: usize,
    },

    /// A record could not be serialized or deserialized.
    #[error("Record marshalling failed: {reason}")]
    Marshal {
        /// Serializer diagnostic
        reason: String,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Error from the protocol, crypto or trust layer.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from the transport layer.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<io::Error> for NodeError {
    fn from(err: io::Error) -> Self {
        Self::Core(CoreError::from(err))
    }
}

impl NodeError {
    /// Creates a configuration loading error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a configuration validation error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a marshalling error.
    pub fn marshal(reason: impl Into<String>) -> Self {
        Self::Marshal {
            reason: reason.into(),
        }
    }

    /// Returns the core error, if this wraps one.
    #[must_use]
    pub const fn as_core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` for configuration errors.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    /// Returns `true` if the process should stop rather than serve on.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.is_config_error()
    }

    /// Returns `true` if the failure may indicate an active attacker.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        match self {
            Self::Core(e) => e.is_suspicious(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rootlink_core::FramingFault;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = NodeError::config_load("/etc/rootlink/node.toml", "file not found");
        assert!(err.to_string().contains("/etc/rootlink/node.toml"));

        let err = NodeError::UnexpectedRecord {
            expected: "message",
            actual: "ping".into(),
        };
        assert!(err.to_string().contains("ping"));
    }

    #[test]
    fn test_error_classification() {
        let config_err = NodeError::config_invalid("protocol.step_length", "at least 128");
        assert!(config_err.is_config_error());
        assert!(config_err.is_fatal());
        assert!(!NodeError::SessionClosed.is_fatal());
    }

    #[test]
    fn test_framing_fault_survives_io_conversion() {
        let err: NodeError = FramingFault::Tampered.into_io().into();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::Framing(FramingFault::Tampered))
        ));
        assert!(err.is_suspicious());
    }
}
