// ============================================
// File: crates/rootlink-node/src/services/mod.rs
// ============================================
//! # Node Services
//!
//! ## Creation Reason
//! Groups the logic that runs on top of a connection, separated from
//! transport and cryptographic primitives.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`handshake`]: handshake state machine and shared context
//! - [`session`]: ready sessions exchanging records
//! - [`marshal`]: typed record encoding
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────────┐   ┌────────────────────────────────┐ │
//! │  │ HandshakeContext │   │           Session              │ │
//! │  │  - identity      │──►│  - runs Handshake on connect   │ │
//! │  │  - trust engine  │   │  - write / read / flush        │ │
//! │  │  - settings, rng │   │  - close                       │ │
//! │  └──────────────────┘   └──────────────┬─────────────────┘ │
//! │                                        │                    │
//! │                         ┌──────────────▼─────────────────┐ │
//! │                         │  RecordWriter / RecordReader   │ │
//! │                         └────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - One `HandshakeContext` per node, shared by every session via `Arc`
//! - Sessions are `Send + Sync`; each direction may run on its own thread
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod handshake;
pub mod marshal;
pub mod session;

// Re-export primary types
pub use handshake::{HandshakeContext, HandshakeState, PeerIdentity, Role};
pub use marshal::{Message, Record, RecordReader, RecordWriter};
pub use session::Session;
