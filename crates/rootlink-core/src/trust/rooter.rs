// ============================================
// File: crates/rootlink-core/src/trust/rooter.rs
// ============================================
//! # Rooter Hierarchy
//!
//! ## Creation Reason
//! Mints the private certificate hierarchy end-points authenticate with:
//! ```text
//! root (self-signed, the trusted anchor)
//!  └─ root-link (CA)
//!      └─ regional (CA)
//!          └─ end-point (RSA identity of one node)
//! ```
//!
//! ## Main Functionality
//! - `Rooter::generate`: creates the three authorities
//! - `Rooter::issue_endpoint`: creates an end-point identity with its chain
//! - `IssuedIdentity::save` / `IssuedIdentity::load`: DER + PKCS#8 PEM files
//!
//! ## ⚠️ Important Note for Next Developer
//! - Authority keys only live in memory; a hierarchy is minted in one go
//! - RSA keys come from the `rsa` crate and are handed to `rcgen` as
//!   PKCS#8 so the same key type backs signing and OAEP
//!
//! ## Last Modified
//! v0.1.0 - Initial hierarchy issuing

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rand::RngCore;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose, SerialNumber, PKCS_RSA_SHA256,
};
use tracing::info;

use rootlink_common::CommonError;

use super::certificate::Certificate;
use crate::crypto::IdentityKeyPair;
use crate::error::{CoreError, Result};

/// File name of the anchor certificate written by [`Rooter::save_authorities`].
pub const ROOT_FILE: &str = "root.der";
/// File name of the root-link certificate.
pub const ROOT_LINK_FILE: &str = "root-link.der";
/// File name of the regional certificate.
pub const REGIONAL_FILE: &str = "regional.der";

fn rcgen_error(context: &str) -> impl FnOnce(rcgen::Error) -> CoreError + '_ {
    move |e| CoreError::certificate(format!("{context}: {e}"))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes)
        .map_err(|e| CommonError::io(format!("writing {}", path.display()), e).into())
}

// ============================================
// Authority
// ============================================

/// One certificate authority of the hierarchy.
struct Authority {
    key_pair: KeyPair,
    issued: rcgen::Certificate,
    certificate: Certificate,
}

impl Authority {
    fn new(common_name: String, path_len: u8, issuer: Option<&Authority>, bits: usize) -> Result<Self> {
        let key_pair = rcgen_key_pair(bits)?;
        let mut params = base_params(&common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Constrained(path_len));
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let issued = match issuer {
            Some(parent) => params
                .signed_by(&key_pair, &parent.issued, &parent.key_pair)
                .map_err(rcgen_error("signing authority"))?,
            None => params
                .self_signed(&key_pair)
                .map_err(rcgen_error("self-signing root"))?,
        };
        let certificate = Certificate::from_der(issued.der().to_vec())?;
        Ok(Self {
            key_pair,
            issued,
            certificate,
        })
    }
}

fn base_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    name.push(DnType::OrganizationName, "rootlink");
    params.distinguished_name = name;

    let mut serial = [0u8; 16];
    OsRng.fill_bytes(&mut serial);
    serial[0] &= 0x7F;
    params.serial_number = Some(SerialNumber::from_slice(&serial));
    params
}

fn rcgen_key_pair_from(identity: &IdentityKeyPair) -> Result<KeyPair> {
    let pem = identity.to_pkcs8_pem()?;
    KeyPair::from_pem_and_sign_algo(&pem, &PKCS_RSA_SHA256).map_err(rcgen_error("loading RSA key"))
}

fn rcgen_key_pair(bits: usize) -> Result<KeyPair> {
    let identity = IdentityKeyPair::generate(&mut OsRng, bits)?;
    rcgen_key_pair_from(&identity)
}

// ============================================
// Rooter
// ============================================

/// The three authorities of a hierarchy, able to issue end-points.
pub struct Rooter {
    name: String,
    bits: usize,
    root: Authority,
    root_link: Authority,
    regional: Authority,
}

impl Rooter {
    /// Generates a new hierarchy named `name` with `bits`-bit RSA keys.
    ///
    /// # Errors
    /// `KeyGeneration` or `Certificate` if minting fails.
    pub fn generate(name: &str, bits: usize) -> Result<Self> {
        let root = Authority::new(format!("{name} root"), 2, None, bits)?;
        let root_link = Authority::new(format!("{name} root-link"), 1, Some(&root), bits)?;
        let regional = Authority::new(format!("{name} regional"), 0, Some(&root_link), bits)?;
        info!(
            hierarchy = name,
            anchor = %root.certificate.alias().short(),
            "Generated rooter hierarchy"
        );
        Ok(Self {
            name: name.to_owned(),
            bits,
            root,
            root_link,
            regional,
        })
    }

    /// The hierarchy name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root certificate, to be pinned as trusted anchor.
    #[must_use]
    pub fn anchor(&self) -> &Certificate {
        &self.root.certificate
    }

    /// Chain presented by end-points: regional, root-link, root.
    #[must_use]
    pub fn chain(&self) -> Vec<Certificate> {
        vec![
            self.regional.certificate.clone(),
            self.root_link.certificate.clone(),
            self.root.certificate.clone(),
        ]
    }

    /// Issues an end-point identity signed by the regional authority.
    ///
    /// # Errors
    /// `KeyGeneration` or `Certificate` if minting fails.
    pub fn issue_endpoint(&self, common_name: &str) -> Result<IssuedIdentity> {
        let key = IdentityKeyPair::generate(&mut OsRng, self.bits)?;
        let key_pair = rcgen_key_pair_from(&key)?;

        let mut params = base_params(common_name);
        params.is_ca = IsCa::ExplicitNoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        let issued = params
            .signed_by(&key_pair, &self.regional.issued, &self.regional.key_pair)
            .map_err(rcgen_error("signing end-point"))?;

        let certificate = Certificate::from_der(issued.der().to_vec())?;
        info!(
            endpoint = common_name,
            alias = %certificate.alias().short(),
            "Issued end-point identity"
        );
        Ok(IssuedIdentity {
            certificate,
            key,
            chain: self.chain(),
        })
    }

    /// Writes the three authority certificates into `dir`.
    ///
    /// # Errors
    /// I/O failure.
    pub fn save_authorities(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .map_err(|e| CommonError::io(format!("creating {}", dir.display()), e))?;
        write_file(&dir.join(ROOT_FILE), self.root.certificate.der())?;
        write_file(&dir.join(ROOT_LINK_FILE), self.root_link.certificate.der())?;
        write_file(&dir.join(REGIONAL_FILE), self.regional.certificate.der())?;
        Ok(())
    }
}

impl std::fmt::Debug for Rooter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rooter")
            .field("name", &self.name)
            .field("anchor", self.root.certificate.alias())
            .finish_non_exhaustive()
    }
}

// ============================================
// IssuedIdentity
// ============================================

/// An end-point certificate, its private key and the chain it presents.
#[derive(Debug, Clone)]
pub struct IssuedIdentity {
    /// End-point certificate.
    pub certificate: Certificate,
    /// Private key matching the certificate.
    pub key: IdentityKeyPair,
    /// Issuers from the regional authority up to the root.
    pub chain: Vec<Certificate>,
}

impl IssuedIdentity {
    /// Leaf followed by its chain, as validated by the trust engine.
    #[must_use]
    pub fn full_chain(&self) -> Vec<Certificate> {
        std::iter::once(self.certificate.clone())
            .chain(self.chain.iter().cloned())
            .collect()
    }

    /// Writes `<name>.der` and `<name>.key.pem` into `dir`.
    /// Returns the certificate and key paths.
    ///
    /// # Errors
    /// I/O or key encoding failure.
    pub fn save(&self, dir: &Path, name: &str) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir)
            .map_err(|e| CommonError::io(format!("creating {}", dir.display()), e))?;
        let cert_path = dir.join(format!("{name}.der"));
        let key_path = dir.join(format!("{name}.key.pem"));
        write_file(&cert_path, self.certificate.der())?;
        write_file(&key_path, self.key.to_pkcs8_pem()?.as_bytes())?;
        Ok((cert_path, key_path))
    }

    /// Loads an identity from its certificate, key and chain files.
    ///
    /// # Errors
    /// - I/O failure or invalid files
    /// - `KeyFormat` if the key does not match the certificate
    pub fn load(certificate: &Path, key: &Path, chain: &[PathBuf]) -> Result<Self> {
        let certificate = Certificate::load(certificate)?;
        let pem = fs::read_to_string(key)
            .map_err(|e| CommonError::io(format!("reading {}", key.display()), e))?;
        let key = IdentityKeyPair::from_pkcs8_pem(&pem)?;
        if !key.matches(&certificate.public_key()?) {
            return Err(CoreError::key_format(
                "private key does not match the end-point certificate",
            ));
        }
        let chain = chain
            .iter()
            .map(|path| Certificate::load(path))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            certificate,
            key,
            chain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::testing::fixture;

    #[test]
    fn test_hierarchy_shape() {
        let pki = fixture();
        let chain = pki.guest.full_chain();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[3].alias(), pki.anchor.alias());
        assert!(chain[1].is_ca() && chain[2].is_ca() && chain[3].is_ca());
        assert!(pki.guest.certificate.subject().contains("guest"));
    }

    #[test]
    fn test_identity_save_and_load() {
        let pki = fixture();
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = pki.guest.save(dir.path(), "guest").unwrap();
        let chain_paths: Vec<PathBuf> = pki
            .guest
            .chain
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let path = dir.path().join(format!("chain{i}.der"));
                fs::write(&path, c.der()).unwrap();
                path
            })
            .collect();

        let loaded = IssuedIdentity::load(&cert, &key, &chain_paths).unwrap();
        assert_eq!(loaded.certificate, pki.guest.certificate);
        assert_eq!(loaded.chain, pki.guest.chain);

        // a key that does not belong to the certificate is refused
        let (_, host_key) = pki.host.save(dir.path(), "host").unwrap();
        assert!(matches!(
            IssuedIdentity::load(&cert, &host_key, &chain_paths),
            Err(CoreError::KeyFormat { .. })
        ));
    }
}
