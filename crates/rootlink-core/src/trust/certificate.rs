// ============================================
// File: crates/rootlink-core/src/trust/certificate.rs
// ============================================
//! # Certificate Handle
//!
//! ## Creation Reason
//! Wraps a DER-encoded X.509 certificate together with its alias so the
//! trust engine and the handshake can pass certificates around without
//! re-hashing or re-parsing them at every step.
//!
//! ## Main Functionality
//! - `Certificate::from_der`: parse-checks and fingerprints a certificate
//! - `verify_issued_by`: one link of a chain (name + signature + CA flag)
//! - `public_key`: the RSA key used to wrap half-state keys
//!
//! ## ⚠️ Important Note for Next Developer
//! - The alias is the SHA-256 of the exact DER bytes; never re-encode
//!
//! ## Last Modified
//! v0.1.0 - Initial certificate handle

use std::fmt;
use std::fs;
use std::path::Path;

use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::{FromDer, X509Error};

use rootlink_common::Alias;

use crate::error::{CoreError, Result};
use crate::protocol::MAX_CERTIFICATE_LEN;

/// A parsed-once, DER-owning certificate.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    alias: Alias,
}

impl Certificate {
    /// Takes ownership of a DER certificate after checking that it parses.
    ///
    /// # Errors
    /// `Certificate` if the DER is not a single well-formed certificate.
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        if der.len() > MAX_CERTIFICATE_LEN {
            return Err(CoreError::MessageTooLarge {
                max: MAX_CERTIFICATE_LEN,
                actual: der.len(),
            });
        }
        let (rest, _) = X509Certificate::from_der(&der)
            .map_err(|e| CoreError::certificate(format!("parse: {e}")))?;
        if !rest.is_empty() {
            return Err(CoreError::certificate("trailing bytes after certificate"));
        }
        let alias = Alias::from_digest(Sha256::digest(&der).into());
        Ok(Self { der, alias })
    }

    /// Reads a DER certificate file.
    ///
    /// # Errors
    /// I/O failure or an invalid certificate.
    pub fn load(path: &Path) -> Result<Self> {
        let der = fs::read(path).map_err(|e| {
            rootlink_common::CommonError::io(format!("reading {}", path.display()), e)
        })?;
        Self::from_der(der)
    }

    /// The certificate's alias (SHA-256 of the DER).
    #[must_use]
    pub const fn alias(&self) -> &Alias {
        &self.alias
    }

    /// Raw DER bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    fn parsed(&self) -> Result<X509Certificate<'_>> {
        X509Certificate::from_der(&self.der)
            .map(|(_, cert)| cert)
            .map_err(|e| CoreError::certificate(format!("parse: {e}")))
    }

    /// Subject distinguished name, for logs.
    #[must_use]
    pub fn subject(&self) -> String {
        self.parsed()
            .map(|c| c.subject().to_string())
            .unwrap_or_default()
    }

    /// Returns `true` if the certificate carries `basicConstraints CA:TRUE`.
    #[must_use]
    pub fn is_ca(&self) -> bool {
        self.parsed().map(|c| c.is_ca()).unwrap_or(false)
    }

    /// The subject's RSA public key.
    ///
    /// # Errors
    /// `KeyFormat` if the key is not RSA.
    pub fn public_key(&self) -> Result<RsaPublicKey> {
        let cert = self.parsed()?;
        RsaPublicKey::from_public_key_der(cert.public_key().raw)
            .map_err(|e| CoreError::key_format(format!("certificate key: {e}")))
    }

    /// Checks that `issuer` issued and signed this certificate.
    ///
    /// # Errors
    /// `InvalidChain` naming the failed condition.
    pub fn verify_issued_by(&self, issuer: &Certificate) -> Result<()> {
        let cert = self.parsed()?;
        let parent = issuer.parsed()?;

        if cert.issuer().as_raw() != parent.subject().as_raw() {
            return Err(CoreError::invalid_chain(format!(
                "{} is not issued by {}",
                cert.subject(),
                parent.subject()
            )));
        }
        if !parent.is_ca() {
            return Err(CoreError::invalid_chain(format!(
                "{} is not a certificate authority",
                parent.subject()
            )));
        }
        if !cert.validity().is_valid() {
            return Err(CoreError::invalid_chain(format!(
                "{} is outside its validity period",
                cert.subject()
            )));
        }
        cert.verify_signature(Some(parent.public_key()))
            .map_err(|e: X509Error| {
                CoreError::invalid_chain(format!("signature of {}: {e}", cert.subject()))
            })
    }

    /// Checks that the certificate is self-issued and self-signed.
    ///
    /// # Errors
    /// `InvalidChain` if it is not.
    pub fn verify_self_signed(&self) -> Result<()> {
        self.verify_issued_by(self)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("alias", &self.alias)
            .field("subject", &self.subject())
            .finish()
    }
}
