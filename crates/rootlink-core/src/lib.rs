// ============================================
// File: crates/rootlink-core/src/lib.rs
// ============================================
//! # rootlink Core - Protocol, Cryptography & Trust
//!
//! ## Creation Reason
//! Holds everything that decides whether a byte on the wire is safe:
//! key material and its wrapping, the streaming cipher, the tamper-evident
//! framing layer and the certificate trust engine.
//!
//! ## Main Functionality
//!
//! ### Protocol Module ([`protocol`])
//! - Wire constants, protocol version, `ProtocolSettings`
//! - Blocking helpers for the handshake fields
//!
//! ### Crypto Module ([`crypto`])
//! - `HalfStateKey`, `KeysBlock`, `DirectionalKeys`, `IdentityKeyPair`
//! - RSA-OAEP half-key wrapping with per-peer salts
//! - AES-256-CTR `CipherWriter` / `CipherReader`
//!
//! ### Framing Module ([`framing`])
//! - `FramedWriter` / `FramedReader`: HMAC-SHA256 checkpoints every step
//!
//! ### Trust Module ([`trust`])
//! - `TrustEngine`: pinned anchor, cadastre cache, chain validation
//! - `CadastreStore` persistence (`MemoryStore`, `JsonFileStore`)
//! - `Rooter`: mints the root / root-link / regional / end-point hierarchy
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              rootlink-node                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │   rootlink-core         rootlink-transport          │
//! │   You are here                │                     │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │             rootlink-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//! - **Confidentiality**: AES-256-CTR, one key per direction chosen by its sender
//! - **Integrity**: HMAC-SHA256 checkpoints, faults are permanent
//! - **Authenticity**: X.509 chains validated up to a single pinned anchor
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic primitives come from RustCrypto crates
//! - NEVER implement custom crypto primitives
//! - ALL secret key types MUST zeroize on drop
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod framing;
pub mod protocol;
pub mod trust;

// Re-export commonly used items
pub use crypto::{
    CipherReader, CipherWriter, DirectionalKeys, HalfStateKey, IdentityKeyPair, KeysBlock,
};
pub use error::{CoreError, Result};
pub use framing::{FramedReader, FramedWriter, FramingFault};
pub use protocol::{ProtocolSettings, ProtocolVersion, CURRENT_PROTOCOL_VERSION};
pub use trust::{Cadastre, CadastreStore, TrustEngine};
