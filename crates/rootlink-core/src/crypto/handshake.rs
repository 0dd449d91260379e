// ============================================
// File: crates/rootlink-core/src/crypto/handshake.rs
// ============================================
//! # Handshake Cryptography
//!
//! ## Creation Reason
//! Provides the two cryptographic steps of the key exchange: RSA wrapping
//! of the half-state key and AES sealing of the keys block.
//!
//! ## Key Exchange Flow
//! ```text
//! Sender                                           Receiver
//!   │                                                 │
//!   │  half = random(48)                              │
//!   │  RSA-OAEP-SHA512(peer_pub, half ^ salt_out) ──► │
//!   │                   half = RSA-OAEP⁻¹(ct) ^ salt_in
//!   │                                                 │
//!   │  keys = random(80)                              │
//!   │  AES-256-CTR(half, keys) ─────────────────────► │
//!   │                       keys = AES-256-CTR(half, ct)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Sender's `salt_out` for a peer must equal the peer's `salt_in` for
//!   the sender, otherwise the recovered half key is garbage
//! - A failed RSA decryption is reported without detail
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake crypto implementation

use rand::{CryptoRng, RngCore};
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use super::keys::{HalfStateKey, IdentityKeyPair, KeysBlock, Salt};
use super::stream::apply_keystream;
use crate::error::{CoreError, Result};
use crate::protocol::KEYS_BLOCK_LEN;

// ============================================
// Half-state key wrapping
// ============================================

/// Salts `half` with `salt_out` and encrypts it for `peer`.
///
/// # Errors
/// `Encryption` if the peer's modulus is too small for OAEP-SHA512.
pub fn wrap_half_key<R: CryptoRng + RngCore>(
    peer: &RsaPublicKey,
    salt_out: &Salt,
    half: &HalfStateKey,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let salted = half.salted(salt_out);
    peer.encrypt(rng, Oaep::new::<Sha512>(), salted.as_bytes())
        .map_err(|e| CoreError::Encryption {
            context: format!("half-state key: {e}"),
        })
}

/// Decrypts a wrapped half-state key and removes `salt_in`.
///
/// # Errors
/// - `Decryption` if the ciphertext does not decrypt under our key
/// - `InvalidLength` if the plaintext is not a half-state key
pub fn unwrap_half_key(
    identity: &IdentityKeyPair,
    salt_in: &Salt,
    ciphertext: &[u8],
) -> Result<HalfStateKey> {
    let plain = Zeroizing::new(
        identity
            .private()
            .decrypt(Oaep::new::<Sha512>(), ciphertext)
            .map_err(|_| CoreError::Decryption)?,
    );
    let salted = HalfStateKey::from_slice(&plain)?;
    Ok(salted.salted(salt_in))
}

// ============================================
// Keys block sealing
// ============================================

/// Encrypts a keys block under the sender's own half-state key.
#[must_use]
pub fn seal_keys_block(half: &HalfStateKey, block: &KeysBlock) -> [u8; KEYS_BLOCK_LEN] {
    let mut sealed = *block.as_bytes();
    apply_keystream(&half.stream_key(), &mut sealed);
    sealed
}

/// Decrypts a keys block with the half-state key received from its sender.
#[must_use]
pub fn open_keys_block(half: &HalfStateKey, sealed: &[u8; KEYS_BLOCK_LEN]) -> KeysBlock {
    let mut plain = *sealed;
    apply_keystream(&half.stream_key(), &mut plain);
    let block = KeysBlock::from_bytes(plain);
    plain.zeroize();
    block
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    static IDENTITY: LazyLock<IdentityKeyPair> = LazyLock::new(|| {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        IdentityKeyPair::generate(&mut rng, 2048).unwrap()
    });

    #[test]
    fn test_wrap_unwrap_with_matching_salts() {
        let mut rng = StdRng::seed_from_u64(11);
        let half = HalfStateKey::generate(&mut rng);
        let salt = Salt::generate(&mut rng);

        let wrapped = wrap_half_key(&IDENTITY.public_key(), &salt, &half, &mut rng).unwrap();
        assert_eq!(wrapped.len(), 256);

        let recovered = unwrap_half_key(&IDENTITY, &salt, &wrapped).unwrap();
        assert_eq!(recovered, half);
    }

    #[test]
    fn test_mismatched_salt_garbles_key() {
        let mut rng = StdRng::seed_from_u64(12);
        let half = HalfStateKey::generate(&mut rng);
        let wrapped =
            wrap_half_key(&IDENTITY.public_key(), &Salt::generate(&mut rng), &half, &mut rng)
                .unwrap();

        let recovered = unwrap_half_key(&IDENTITY, &Salt::zero(), &wrapped).unwrap();
        assert_ne!(recovered, half);
    }

    #[test]
    fn test_corrupted_ciphertext_fails() {
        let mut rng = StdRng::seed_from_u64(13);
        let half = HalfStateKey::generate(&mut rng);
        let mut wrapped =
            wrap_half_key(&IDENTITY.public_key(), &Salt::zero(), &half, &mut rng).unwrap();
        wrapped[10] ^= 0x01;

        assert!(matches!(
            unwrap_half_key(&IDENTITY, &Salt::zero(), &wrapped),
            Err(CoreError::Decryption)
        ));
    }

    #[test]
    fn test_keys_block_seal_open() {
        let mut rng = StdRng::seed_from_u64(14);
        let half = HalfStateKey::generate(&mut rng);
        let block = KeysBlock::generate(&mut rng);

        let sealed = seal_keys_block(&half, &block);
        assert_ne!(&sealed, block.as_bytes());

        let opened = open_keys_block(&half, &sealed);
        assert_eq!(opened.as_bytes(), block.as_bytes());
    }
}
