// ============================================
// File: crates/rootlink-core/src/trust/engine.rs
// ============================================
//! # Trust Engine
//!
//! ## Creation Reason
//! Decides whether a peer's end-point certificate is trusted, either from
//! its cadastre (fast path) or by walking the chain it presents up to the
//! pinned anchor (slow path), and remembers what it validated.
//!
//! ## Validation Flow
//! ```text
//! verify_end_point_certificate(leaf)
//!   ├─ cadastre(alias(leaf)) ── none ──► UntrustedCertificate
//!   ├─ leaf signed by cached issuer?
//!   └─ recheck(issuer chain up to anchor)
//!
//! add_end_point_chain([leaf, regional, root-link, root])
//!   ├─ length == path_length
//!   ├─ top is the trusted anchor
//!   ├─ every adjacent pair: name + CA flag + signature
//!   └─ persist issuers (deduplicated) + new cadastre
//! ```
//!
//! ## Concurrency
//! One engine is shared by every session of a process (`Arc<TrustEngine>`).
//! The in-memory caches are `DashMap`s: a lock is held only for the
//! duration of one lookup or insert, never across validation work.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Cached trust stays valid until an issuer or the anchor is removed;
//!   there is no revocation lookup
//! - New cadastres carry placeholder salts, and the handshake never
//!   rotates them
//!
//! ## Last Modified
//! v0.1.0 - Initial trust engine

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use rootlink_common::Alias;

use super::cadastre::{Cadastre, IssuerRecord};
use super::certificate::Certificate;
use super::store::CadastreStore;
use crate::crypto::Salt;
use crate::error::{CoreError, Result};

/// Trust decisions for one pinned anchor.
pub struct TrustEngine {
    anchor: Certificate,
    path_length: usize,
    store: Arc<dyn CadastreStore>,
    /// Cadastres loaded or created in this process.
    cadastres: DashMap<Alias, Cadastre>,
    /// Authority certificates loaded in this process.
    issuers: DashMap<Alias, Certificate>,
}

impl TrustEngine {
    /// Creates an engine pinned to `anchor`, backed by `store`.
    ///
    /// The anchor is recorded in the store as the root of every issuer chain.
    ///
    /// # Errors
    /// - `InvalidChain` if the anchor is not a self-signed authority
    /// - `InvalidState` if `path_length` is below 2
    /// - `Store` if the anchor record cannot be persisted
    pub fn new(anchor: Certificate, store: Arc<dyn CadastreStore>, path_length: usize) -> Result<Self> {
        if path_length < 2 {
            return Err(CoreError::invalid_state(
                "trust.path_length",
                "at least 2 (end-point and anchor)",
            ));
        }
        anchor.verify_self_signed()?;
        store.insert_issuer(IssuerRecord {
            alias: *anchor.alias(),
            certificate: anchor.der().to_vec(),
            issuer: None,
        })?;
        info!(
            anchor = %anchor.alias().short(),
            subject = %anchor.subject(),
            path_length,
            "Trust engine pinned"
        );

        let issuers = DashMap::new();
        issuers.insert(*anchor.alias(), anchor.clone());
        Ok(Self {
            anchor,
            path_length,
            store,
            cadastres: DashMap::new(),
            issuers,
        })
    }

    /// The pinned anchor.
    #[must_use]
    pub fn anchor(&self) -> &Certificate {
        &self.anchor
    }

    /// Number of certificates in a complete chain, leaf included.
    #[must_use]
    pub fn path_length(&self) -> usize {
        self.path_length
    }

    /// Returns `true` only for the pinned anchor itself, and only if it
    /// verifies against the anchor's key.
    #[must_use]
    pub fn is_trusted_anchor(&self, cert: &Certificate) -> bool {
        cert.alias() == self.anchor.alias() && cert.verify_issued_by(&self.anchor).is_ok()
    }

    /// Fast path: validates a peer from its cadastre.
    ///
    /// # Errors
    /// - `UntrustedCertificate` if the peer has no cadastre; the caller
    ///   falls back to [`Self::add_end_point_chain`]
    /// - `InvalidChain` if the cached issuer no longer vouches for it
    pub fn verify_end_point_certificate(&self, cert: &Certificate) -> Result<Cadastre> {
        let alias = *cert.alias();
        let cadastre = self
            .cadastre(&alias)?
            .ok_or(CoreError::UntrustedCertificate { alias })?;

        let issuer = self.issuer_certificate(&cadastre.issuer)?;
        cert.verify_issued_by(&issuer)?;
        self.recheck(&cadastre.issuer)?;

        debug!(peer = %alias.short(), "Peer trusted from cadastre");
        Ok(cadastre)
    }

    /// Slow path: validates a full chain and records the peer.
    ///
    /// `chain[0]` is the end-point, `chain[len - 1]` the anchor.
    ///
    /// # Errors
    /// `InvalidChain` if the chain has the wrong length, does not end at
    /// the anchor, or any link fails.
    pub fn add_end_point_chain(&self, chain: &[Certificate]) -> Result<Cadastre> {
        if chain.len() != self.path_length {
            return Err(CoreError::invalid_chain(format!(
                "expected {} certificates, got {}",
                self.path_length,
                chain.len()
            )));
        }
        let (leaf, authorities) = chain
            .split_first()
            .ok_or_else(|| CoreError::invalid_chain("empty chain"))?;
        let top = authorities
            .last()
            .ok_or_else(|| CoreError::invalid_chain("chain has no issuer"))?;
        if !self.is_trusted_anchor(top) {
            warn!(top = %top.alias().short(), "Chain does not end at the trusted anchor");
            return Err(CoreError::invalid_chain("chain does not end at the trusted anchor"));
        }
        for pair in chain.windows(2) {
            pair[0].verify_issued_by(&pair[1])?;
        }

        // Persist from the anchor down so every stored link has its parent.
        for (i, authority) in authorities.iter().enumerate().rev() {
            let parent = authorities.get(i + 1).map(|c| *c.alias());
            let inserted = self.store.insert_issuer(IssuerRecord {
                alias: *authority.alias(),
                certificate: authority.der().to_vec(),
                issuer: parent,
            })?;
            if inserted {
                debug!(issuer = %authority.alias().short(), "Recorded authority");
            }
            self.issuers
                .entry(*authority.alias())
                .or_insert_with(|| authority.clone());
        }

        let record = Cadastre::new(*leaf.alias(), *authorities[0].alias());
        let stored = self.store.insert_cadastre(record)?;
        self.cadastres.insert(stored.alias, stored.clone());
        info!(
            peer = %leaf.alias().short(),
            subject = %leaf.subject(),
            "Peer chain validated and recorded"
        );
        Ok(stored)
    }

    /// Looks up a cadastre, loading it from the store on first use.
    ///
    /// # Errors
    /// `Store` on backend failure.
    pub fn cadastre(&self, alias: &Alias) -> Result<Option<Cadastre>> {
        if let Some(cached) = self.cadastres.get(alias) {
            return Ok(Some(cached.clone()));
        }
        let loaded = self.store.cadastre(alias)?;
        if let Some(record) = &loaded {
            self.cadastres
                .entry(*alias)
                .or_insert_with(|| record.clone());
        }
        Ok(loaded)
    }

    /// Replaces the salts of a peer's cadastre.
    ///
    /// # Errors
    /// `Store` if the peer has no cadastre.
    pub fn update_salt(&self, alias: &Alias, salt_in: Salt, salt_out: Salt) -> Result<()> {
        self.store
            .update_salt(alias, salt_in.clone(), salt_out.clone())?;
        if let Some(mut cached) = self.cadastres.get_mut(alias) {
            cached.salt_in = salt_in;
            cached.salt_out = salt_out;
        }
        Ok(())
    }

    /// Walks the recorded issuer chain from `issuer` to the anchor.
    ///
    /// # Errors
    /// `InvalidChain` if a link is missing, the walk does not end at the
    /// pinned anchor, or it is longer than the path length allows.
    pub fn recheck(&self, issuer: &Alias) -> Result<()> {
        let mut current = *issuer;
        for _ in 1..self.path_length {
            let record = self.store.issuer(&current)?.ok_or_else(|| {
                CoreError::invalid_chain(format!("issuer {} is no longer recorded", current.short()))
            })?;
            match record.issuer {
                Some(parent) => current = parent,
                None if &current == self.anchor.alias() => return Ok(()),
                None => {
                    return Err(CoreError::invalid_chain(format!(
                        "issuer chain ends at {} instead of the anchor",
                        current.short()
                    )))
                }
            }
        }
        Err(CoreError::invalid_chain("issuer chain longer than path length"))
    }

    /// Removes an authority from the store and caches. Every peer below it
    /// fails its next recheck.
    ///
    /// # Errors
    /// `Store` on backend failure.
    pub fn forget_issuer(&self, alias: &Alias) -> Result<bool> {
        self.issuers.remove(alias);
        let removed = self.store.remove_issuer(alias)?;
        if removed {
            warn!(issuer = %alias.short(), "Authority removed from trust store");
        }
        Ok(removed)
    }

    fn issuer_certificate(&self, alias: &Alias) -> Result<Certificate> {
        if let Some(cert) = self.issuers.get(alias) {
            return Ok(cert.clone());
        }
        let record = self.store.issuer(alias)?.ok_or_else(|| {
            CoreError::invalid_chain(format!("issuer {} is not recorded", alias.short()))
        })?;
        let cert = Certificate::from_der(record.certificate)?;
        if cert.alias() != alias {
            return Err(CoreError::store(format!(
                "issuer record {} holds a different certificate",
                alias.short()
            )));
        }
        self.issuers.entry(*alias).or_insert_with(|| cert.clone());
        Ok(cert)
    }
}

impl std::fmt::Debug for TrustEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustEngine")
            .field("anchor", self.anchor.alias())
            .field("path_length", &self.path_length)
            .field("cached_cadastres", &self.cadastres.len())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::store::MemoryStore;
    use crate::trust::testing::fixture;

    fn engine() -> (TrustEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = TrustEngine::new(fixture().anchor.clone(), store.clone(), 4).unwrap();
        (engine, store)
    }

    #[test]
    fn test_anchor_is_trusted() {
        let (engine, _) = engine();
        let pki = fixture();
        assert!(engine.is_trusted_anchor(&pki.anchor));
        assert!(!engine.is_trusted_anchor(&pki.guest.chain[1]));
        assert!(!engine.is_trusted_anchor(&pki.foreign.chain[2]));
    }

    #[test]
    fn test_unknown_peer_needs_chain() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.verify_end_point_certificate(&fixture().guest.certificate),
            Err(CoreError::UntrustedCertificate { .. })
        ));
    }

    #[test]
    fn test_chain_then_fast_path() {
        let (engine, store) = engine();
        let pki = fixture();

        let created = engine.add_end_point_chain(&pki.guest.full_chain()).unwrap();
        assert_eq!(&created.alias, pki.guest.certificate.alias());
        assert_eq!(created.salt_in, Salt::zero());
        assert_eq!(store.cadastre_count(), 1);

        let cached = engine
            .verify_end_point_certificate(&pki.guest.certificate)
            .unwrap();
        assert_eq!(cached, created);
    }

    #[test]
    fn test_fast_path_survives_restart_from_store() {
        let (engine, store) = engine();
        let pki = fixture();
        engine.add_end_point_chain(&pki.host.full_chain()).unwrap();

        let restarted = TrustEngine::new(pki.anchor.clone(), store, 4).unwrap();
        assert!(restarted
            .verify_end_point_certificate(&pki.host.certificate)
            .is_ok());
    }

    #[test]
    fn test_shared_issuers_deduplicated() {
        let (engine, store) = engine();
        let pki = fixture();
        engine.add_end_point_chain(&pki.guest.full_chain()).unwrap();
        engine.add_end_point_chain(&pki.host.full_chain()).unwrap();

        assert_eq!(store.cadastre_count(), 2);
        let regional = store.issuer(pki.guest.chain[0].alias()).unwrap().unwrap();
        assert_eq!(regional.issuer.as_ref(), Some(pki.guest.chain[1].alias()));
    }

    #[test]
    fn test_foreign_chain_rejected() {
        let (engine, store) = engine();
        let pki = fixture();
        assert!(matches!(
            engine.add_end_point_chain(&pki.foreign.full_chain()),
            Err(CoreError::InvalidChain { .. })
        ));
        assert_eq!(store.cadastre_count(), 0);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let (engine, _) = engine();
        let pki = fixture();
        let mut short = pki.guest.full_chain();
        short.remove(1);
        assert!(matches!(
            engine.add_end_point_chain(&short),
            Err(CoreError::InvalidChain { .. })
        ));
    }

    #[test]
    fn test_spliced_chain_rejected() {
        let (engine, _) = engine();
        let pki = fixture();
        // foreign leaf and regional on top of our root-link and root
        let mut chain = pki.foreign.full_chain();
        chain[2] = pki.guest.chain[1].clone();
        chain[3] = pki.guest.chain[2].clone();
        assert!(engine.add_end_point_chain(&chain).is_err());
    }

    #[test]
    fn test_forgotten_issuer_fails_recheck() {
        let (engine, _) = engine();
        let pki = fixture();
        engine.add_end_point_chain(&pki.guest.full_chain()).unwrap();

        assert!(engine.forget_issuer(pki.guest.chain[1].alias()).unwrap());
        assert!(matches!(
            engine.verify_end_point_certificate(&pki.guest.certificate),
            Err(CoreError::InvalidChain { .. })
        ));
    }

    #[test]
    fn test_update_salt_reaches_cache_and_store() {
        let (engine, store) = engine();
        let pki = fixture();
        let alias = *pki.guest.certificate.alias();
        engine.add_end_point_chain(&pki.guest.full_chain()).unwrap();

        let salt = Salt::from_bytes([5; 48]);
        engine.update_salt(&alias, salt.clone(), Salt::zero()).unwrap();
        assert_eq!(engine.cadastre(&alias).unwrap().unwrap().salt_in, salt);
        assert_eq!(store.cadastre(&alias).unwrap().unwrap().salt_in, salt);
    }

    #[test]
    fn test_non_anchor_rejected_as_pin() {
        let pki = fixture();
        assert!(TrustEngine::new(
            pki.guest.chain[0].clone(),
            Arc::new(MemoryStore::new()),
            4
        )
        .is_err());
    }
}
