// ============================================
// File: crates/rootlink-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the connection abstraction the handshake and session run on,
//! so the same code drives TCP sockets, in-memory pipes and rate-limited
//! wrappers.
//!
//! ## Main Functionality
//! - `Connection`: a blocking, full-duplex byte stream
//!
//! ## Design Philosophy
//! - Blocking `std::io` halves; concurrency comes from threads
//! - The two halves can be driven by different threads
//! - Shutting a connection down unblocks any thread parked on it
//!
//! ## ⚠️ Important Note for Next Developer
//! - `split` may be called more than once; every pair shares the same
//!   underlying stream and must not be used concurrently per direction
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

// ============================================
// Connection Trait
// ============================================

/// A blocking full-duplex byte stream between two end-points.
///
/// # Thread Safety
/// Implementations are `Send + Sync`: one thread may call `shutdown`
/// while others are blocked on the halves.
///
/// # Example
/// ```
/// use std::io::{Read, Write};
/// use rootlink_transport::{memory, Connection};
///
/// let (a, b) = memory::pipe("a", "b");
/// let (_, mut a_out) = a.split().unwrap();
/// let (mut b_in, _) = b.split().unwrap();
///
/// a_out.write_all(b"ping").unwrap();
/// let mut buf = [0u8; 4];
/// b_in.read_exact(&mut buf).unwrap();
/// assert_eq!(&buf, b"ping");
/// ```
pub trait Connection: Send + Sync + 'static {
    /// Receiving half.
    type Reader: Read + Send + 'static;
    /// Sending half.
    type Writer: Write + Send + 'static;

    /// Returns handles on both directions of the stream.
    ///
    /// # Errors
    /// `Closed` after shutdown, or an I/O error duplicating the stream.
    fn split(&self) -> Result<(Self::Reader, Self::Writer)>;

    /// Sets the deadline of every blocking read (`None` = infinite).
    ///
    /// # Errors
    /// Returns error if the timeout cannot be applied.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Closes both directions, waking blocked readers and writers.
    /// Idempotent.
    ///
    /// # Errors
    /// Returns error if the underlying close fails.
    fn shutdown(&self) -> Result<()>;

    /// Returns `true` until `shutdown` has been called.
    fn is_open(&self) -> bool;

    /// Human-readable peer description for logs.
    fn peer(&self) -> String;

    /// Marks the start (`true`) or end (`false`) of a write phase.
    ///
    /// Only rate-limited connections care; the default does nothing.
    fn set_stepped(&self, _stepped: bool) {}

    /// Returns the current write-phase flag.
    fn is_stepped(&self) -> bool {
        false
    }
}
