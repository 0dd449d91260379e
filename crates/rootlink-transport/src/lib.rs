// ============================================
// File: crates/rootlink-transport/src/lib.rs
// ============================================
//! # Rootlink Transport - Connection Layer
//!
//! ## Creation Reason
//! Provides the blocking byte streams rootlink sessions run on, behind one
//! trait so the handshake never knows which kind of stream it drives.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: the `Connection` trait
//! - [`tcp`]: TCP connections and the listening server
//! - [`memory`]: in-memory duplex pipe for tests
//! - [`throttle`]: token-bucket rate limiting and the stepped flag
//! - [`error`]: transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              rootlink-node                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   rootlink-core        rootlink-transport          │
//! │                        You are here ◄──            │
//! │         │                                          │
//! │         ▼                                          │
//! │   rootlink-common                                  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Everything here is plain bytes; encryption and framing live in
//!   `rootlink-core`
//! - Always code against `Connection` so tests can use `memory::pipe`
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod memory;
pub mod tcp;
pub mod throttle;
pub mod traits;

// Re-export primary types
pub use error::{Result, TransportError};
pub use memory::MemoryConnection;
pub use tcp::{TcpConnection, TcpServer};
pub use throttle::{Throttle, Throttled};
pub use traits::Connection;
