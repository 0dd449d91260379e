// ============================================
// File: crates/rootlink-core/src/trust/mod.rs
// ============================================
//! # Trust Module
//!
//! ## Creation Reason
//! Everything needed to decide whether a peer's certificate is acceptable:
//! the certificate handle, the trust cache records and their persistence,
//! the engine that validates chains, and the tooling that mints them.
//!
//! ## Main Functionality
//! - [`certificate`]: DER certificate with its alias
//! - [`cadastre`]: persisted per-peer and per-authority records
//! - [`store`]: `CadastreStore` trait, memory and JSON file stores
//! - [`engine`]: `TrustEngine` (anchor, fast path, slow path)
//! - [`rooter`]: root / root-link / regional / end-point issuing
//!
//! ## Last Modified
//! v0.1.0 - Initial trust module

pub mod cadastre;
pub mod certificate;
pub mod engine;
pub mod rooter;
pub mod store;

pub use cadastre::{Cadastre, IssuerRecord};
pub use certificate::Certificate;
pub use engine::TrustEngine;
pub use rooter::{IssuedIdentity, Rooter};
pub use store::{CadastreStore, JsonFileStore, MemoryStore};

/// Shared test hierarchy; RSA generation is too slow to repeat per test.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::LazyLock;

    use super::{Certificate, IssuedIdentity, Rooter};

    pub(crate) struct Pki {
        pub anchor: Certificate,
        pub guest: IssuedIdentity,
        pub host: IssuedIdentity,
        /// Issued by an unrelated hierarchy.
        pub foreign: IssuedIdentity,
    }

    static PKI: LazyLock<Pki> = LazyLock::new(|| {
        let rooter = Rooter::generate("test", 2048).unwrap();
        let other = Rooter::generate("other", 2048).unwrap();
        Pki {
            anchor: rooter.anchor().clone(),
            guest: rooter.issue_endpoint("guest").unwrap(),
            host: rooter.issue_endpoint("host").unwrap(),
            foreign: other.issue_endpoint("intruder").unwrap(),
        }
    });

    pub(crate) fn fixture() -> &'static Pki {
        &PKI
    }
}
