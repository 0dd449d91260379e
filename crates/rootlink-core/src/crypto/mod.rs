// ============================================
// File: crates/rootlink-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes the key material and primitives of the transport, built on
//! audited RustCrypto implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: key material types and the RSA identity key
//! - [`handshake`]: half-key wrapping and keys block sealing
//! - [`stream`]: AES-256-CTR cipher stream pair
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                          │
//! │  Guest                                         Host         │
//! │    │  RSA-OAEP(host_pub, half_g ^ salt) ──────────► │       │
//! │    │ ◄────────── RSA-OAEP(guest_pub, half_h ^ salt) │       │
//! │    │  AES-CTR(half_g, keys_g) ────────────────────► │       │
//! │    │ ◄────────────────────── AES-CTR(half_h, keys_h)│       │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Transport Phase                          │
//! │  guest → host : AES-CTR(keys_g.cipher) + HMAC(keys_g.auth)  │
//! │  host → guest : AES-CTR(keys_h.cipher) + HMAC(keys_h.auth)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Each direction is keyed only by its sender's keys block
//! - ALL secret key types implement Zeroize
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod handshake;
pub mod keys;
pub mod stream;

// Re-export primary types at module level
pub use handshake::{open_keys_block, seal_keys_block, unwrap_half_key, wrap_half_key};
pub use keys::{
    AuthKey, DirectionalKeys, HalfStateKey, IdentityKeyPair, KeysBlock, Salt, StreamKey,
};
pub use stream::{CipherReader, CipherWriter};

/// Smallest RSA modulus accepted for identities.
pub const MIN_RSA_BITS: usize = 2048;
