// ============================================
// File: crates/rootlink-node/src/lib.rs
// ============================================
//! # Rootlink Node Library
//!
//! ## Creation Reason
//! Turns the protocol pieces of `rootlink-core` and the connections of
//! `rootlink-transport` into sessions an application can use, plus the
//! configuration the `rootlink` binary runs from.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Node configuration management
//! - [`services`]: Handshake, sessions and record marshalling
//! - [`error`]: Node-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         rootlink node                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐   │
//! │  │   Config    │────►│  Handshake  │────►│     Session     │   │
//! │  │             │     │   Context   │     │ (records in/out)│   │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘   │
//! │                             │                     │            │
//! ├─────────────────────────────┼─────────────────────┼────────────┤
//! │        rootlink-core        │                     │            │
//! │  trust engine, key exchange ┘   framing + cipher ─┘            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │     rootlink-transport: TCP, memory pipe, rate limiting         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Record → JSON → charset → framing (HMAC checkpoints) → AES-CTR → wire
//! Record ← JSON ← charset ← framing (verified)         ← AES-CTR ← wire
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Everything is blocking; run one thread per session (or per direction)
//! - Configuration changes require restart (no hot-reload)
//!
//! ## Last Modified
//! v0.1.0 - Initial node library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod services;

// Re-export primary types
pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use services::{HandshakeContext, Message, Record, Role, Session};
