// ============================================
// File: crates/rootlink-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types of the connection layer: establishing, accepting
//! and tearing down byte streams.
//!
//! ## Main Functionality
//! - `TransportError`: Primary error enum for transport operations
//! - Categorization of retryable vs fatal errors
//!
//! ## Error Categories
//! 1. **Network Errors**: connect, bind and accept failures
//! 2. **Lifecycle Errors**: use of a closed connection
//! 3. **Configuration Errors**: invalid addresses or limits
//!
//! ## ⚠️ Important Note for Next Developer
//! - Errors raised while reading or writing a connection are plain
//!   `std::io::Error`s; this enum covers the operations around them
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Network Errors
    // ========================================

    /// Failed to bind to address.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: SocketAddr,
        /// Why binding failed
        reason: String,
    },

    /// Failed to reach a peer.
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectFailed {
        /// Peer address
        addr: String,
        /// Why connecting failed
        reason: String,
    },

    /// Failed to accept an incoming connection.
    #[error("Failed to accept connection: {reason}")]
    AcceptFailed {
        /// Why accepting failed
        reason: String,
    },

    // ========================================
    // Lifecycle Errors
    // ========================================

    /// The connection was already shut down.
    #[error("Connection closed")]
    Closed,

    // ========================================
    // Configuration Errors
    // ========================================

    /// Invalid configuration.
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig {
        /// Configuration field name
        field: String,
        /// Why it's invalid
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(addr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            addr: addr.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    ///
    /// A retry means a new connection; a failed connection is never reused.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectFailed { .. } | Self::AcceptFailed { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionRefused
            ),
            _ => false,
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
    fn test_error_display() {
        let err = TransportError::connect_failed("10.0.0.1:7420", "refused");
        assert!(err.to_string().contains("10.0.0.1:7420"));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TransportError::connect_failed("x", "y").is_retryable());
        assert!(!TransportError::Closed.is_retryable());
        assert!(TransportError::io(
            "read",
            io::Error::new(io::ErrorKind::TimedOut, "slow")
        )
        .is_retryable());
        assert!(!TransportError::invalid_config("limits", "bad").is_retryable());
    }
}
