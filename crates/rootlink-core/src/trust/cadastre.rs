// ============================================
// File: crates/rootlink-core/src/trust/cadastre.rs
// ============================================
//! # Trust Cache Records
//!
//! ## Creation Reason
//! Persisted records of the trust cache: one `Cadastre` per trusted peer
//! and one `IssuerRecord` per certificate authority above them. Issuer
//! records form a linked list up to the anchor, shared by every peer
//! issued by the same authority.
//!
//! ## Record Layout
//! ```text
//! Cadastre(peer) ──issuer──► IssuerRecord(regional)
//!                                 │ issuer
//!                                 ▼
//!                            IssuerRecord(root-link)
//!                                 │ issuer
//!                                 ▼
//!                            IssuerRecord(root)  issuer = None
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only the salt fields of a cadastre may change after creation
//!
//! ## Last Modified
//! v0.1.0 - Initial record definitions

use serde::{Deserialize, Serialize};

use rootlink_common::{Alias, Timestamp};

use crate::crypto::Salt;

/// Trust cache record of one peer end-point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadastre {
    /// Alias of the peer's end-point certificate.
    pub alias: Alias,
    /// XORed into half-state keys received from the peer.
    pub salt_in: Salt,
    /// XORed into half-state keys sent to the peer.
    pub salt_out: Salt,
    /// Alias of the authority that issued the peer.
    pub issuer: Alias,
    /// When the peer's chain was first validated.
    pub created_at: Timestamp,
}

impl Cadastre {
    /// A fresh record with placeholder salts.
    #[must_use]
    pub fn new(alias: Alias, issuer: Alias) -> Self {
        Self {
            alias,
            salt_in: Salt::zero(),
            salt_out: Salt::zero(),
            issuer,
            created_at: Timestamp::now(),
        }
    }
}

/// Trust cache record of one certificate authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerRecord {
    /// Alias of the authority certificate.
    pub alias: Alias,
    /// DER of the authority certificate.
    #[serde(with = "der_base64")]
    pub certificate: Vec<u8>,
    /// Next authority up the chain; `None` for the anchor.
    pub issuer: Option<Alias>,
}

mod der_base64 {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(der: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(der))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(s).map_err(serde::de::Error::custom)
    }
}
