// ============================================
// File: crates/rootlink-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Base error shared by the rootlink crates for validation, I/O and
//! encoding failures that are not specific to one layer.
//!
//! ## Design Philosophy
//! - `thiserror` derived, one enum per crate, outer enums wrap this one
//! - Messages are loggable: no key material, no salts
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

// ============================================
// CommonError
// ============================================

/// Common error types shared across rootlink crates.
///
/// # Example
/// ```
/// use rootlink_common::error::{CommonError, Result};
///
/// fn validate_alias(text: &str) -> Result<()> {
///     if text.is_empty() {
///         return Err(CommonError::invalid_input("alias", "cannot be empty"));
///     }
///     Ok(())
/// }
/// assert!(validate_alias("").is_err());
/// ```
#[derive(Error, Debug)]
pub enum CommonError {
    // ========================================
    // Validation Errors
    // ========================================

    /// Invalid input data provided.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the field or parameter
        field: String,
        /// Description of what's wrong
        reason: String,
    },

    /// Data length doesn't match expected size.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Charset code or name is not recognized.
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    // ========================================
    // IO Errors
    // ========================================

    /// System I/O error occurred.
    #[error("I/O error: {context}")]
    Io {
        /// What operation was being performed
        context: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    // ========================================
    // Decoding Errors
    // ========================================

    /// Failed to decode/deserialize data.
    #[error("Decoding error: {context}: {details}")]
    Decoding {
        /// What was being decoded
        context: String,
        /// Error details
        details: String,
    },
}

impl CommonError {
    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidLength` error.
    #[must_use]
    pub const fn invalid_length(expected: usize, actual: usize) -> Self {
        Self::InvalidLength { expected, actual }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a `Decoding` error.
    pub fn decoding(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Decoding {
            context: context.into(),
            details: details.into(),
        }
    }

    /// Returns `true` if the error was caused by bad caller input.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::InvalidLength { .. } | Self::UnsupportedCharset(_)
        )
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
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
        let err = CommonError::invalid_input("alias", "must be 64 hex characters");
        assert!(err.to_string().contains("alias"));
        assert!(err.to_string().contains("64 hex"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CommonError::invalid_length(48, 12).is_client_error());
        assert!(CommonError::UnsupportedCharset("ebcdic".into()).is_client_error());
        assert!(!CommonError::decoding("record", "bad json").is_client_error());
    }

    #[test]
    fn test_decoding_error_keeps_context() {
        let err = CommonError::decoding("record", "bad json");
        assert!(matches!(err, CommonError::Decoding { ref context, .. } if context == "record"));
        assert_eq!(err.to_string(), "Decoding error: record: bad json");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let common_err: CommonError = io_err.into();
        assert!(matches!(common_err, CommonError::Io { .. }));
    }
}
