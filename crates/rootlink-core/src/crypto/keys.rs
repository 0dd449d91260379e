// ============================================
// File: crates/rootlink-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Defines the key material exchanged during the handshake and the
//! per-direction keys that come out of it, with proper security
//! properties (Zeroize on drop, constant-time comparison).
//!
//! ## Main Functionality
//! - `IdentityKeyPair`: long-term RSA key bound to the end-point certificate
//! - `HalfStateKey`: ephemeral 48-byte key + IV, RSA-wrapped on the wire
//! - `KeysBlock`: 80-byte per-direction secret chosen by its sender
//! - `Salt`: persisted per-peer value XORed into half-state keys
//! - `DirectionalKeys`: the role assignment of both keys blocks
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  IdentityKeyPair (Long-term)                               │
//! │  └─ Unwraps the half-state key the peer sent us            │
//! │                                                            │
//! │  HalfStateKey (Per-handshake)                              │
//! │  └─ Encrypts exactly one keys block, then dropped          │
//! │                                                            │
//! │  KeysBlock (Per-handshake, one per side)                   │
//! │  ├─ [0:32)  cipher key of the generator's outgoing stream  │
//! │  ├─ [32:48) cipher IV of the generator's outgoing stream   │
//! │  └─ [48:80) authentication key checking the receiver's     │
//! │             stream (generator's incoming direction)        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL secret key types MUST implement Zeroize
//! - Private keys should NEVER be logged
//! - `DirectionalKeys::assign` is asymmetric; swapping its arguments
//!   silently breaks both directions
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{CryptoRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::MIN_RSA_BITS;
use crate::error::{CoreError, Result};
use crate::protocol::{
    AUTH_KEY_LEN, CIPHER_IV_LEN, CIPHER_KEY_LEN, HALF_STATE_KEY_LEN, KEYS_BLOCK_LEN,
};

// ============================================
// IdentityKeyPair (RSA)
// ============================================

/// Long-term RSA identity key of an end-point.
///
/// # Purpose
/// Its public half is embedded in the end-point certificate; the private
/// half unwraps the half-state key a peer sends during the handshake.
///
/// # Security
/// - The `rsa` crate zeroizes private key components on drop
/// - `Debug` prints only the modulus size
#[derive(Clone)]
pub struct IdentityKeyPair {
    private: RsaPrivateKey,
}

impl IdentityKeyPair {
    /// Generates a new RSA key of `bits` bits.
    ///
    /// # Errors
    /// `KeyGeneration` if `bits` is below [`MIN_RSA_BITS`] or generation fails.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R, bits: usize) -> Result<Self> {
        if bits < MIN_RSA_BITS {
            return Err(CoreError::key_generation(format!(
                "RSA modulus of {bits} bits is below {MIN_RSA_BITS}"
            )));
        }
        let private = RsaPrivateKey::new(rng, bits)
            .map_err(|e| CoreError::key_generation(format!("RSA-{bits}: {e}")))?;
        Ok(Self { private })
    }

    /// Loads a PKCS#8 PEM private key.
    ///
    /// # Errors
    /// `KeyFormat` if the PEM is not an RSA PKCS#8 key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| CoreError::key_format(format!("PKCS#8 PEM: {e}")))?;
        Ok(Self { private })
    }

    /// Loads a PKCS#8 DER private key.
    ///
    /// # Errors
    /// `KeyFormat` if the DER is not an RSA PKCS#8 key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| CoreError::key_format(format!("PKCS#8 DER: {e}")))?;
        Ok(Self { private })
    }

    /// Exports the private key as PKCS#8 PEM.
    ///
    /// # Security Warning
    /// The returned string is zeroized on drop; do not copy it elsewhere.
    ///
    /// # Errors
    /// `KeyFormat` if encoding fails.
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>> {
        self.private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CoreError::key_format(format!("PKCS#8 PEM: {e}")))
    }

    /// Returns the public key.
    #[must_use]
    pub fn public_key(&self) -> RsaPublicKey {
        self.private.to_public_key()
    }

    /// Returns `true` if `public` is the public half of this key.
    #[must_use]
    pub fn matches(&self, public: &RsaPublicKey) -> bool {
        self.private.n() == public.n() && self.private.e() == public.e()
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.private.size() * 8
    }

    pub(crate) fn private(&self) -> &RsaPrivateKey {
        &self.private
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material
        f.debug_struct("IdentityKeyPair")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

// ============================================
// Salt
// ============================================

/// Per-peer value XORed into every half-state key exchanged with that peer.
///
/// Stored in the peer's cadastre; serialized as base64 like the other
/// persisted key material.
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct Salt([u8; HALF_STATE_KEY_LEN]);

impl Salt {
    /// The placeholder salt a cadastre starts with.
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; HALF_STATE_KEY_LEN])
    }

    /// Creates a salt from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; HALF_STATE_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generates a random salt.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; HALF_STATE_KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Returns the raw salt bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HALF_STATE_KEY_LEN] {
        &self.0
    }
}

impl Default for Salt {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt([REDACTED])")
    }
}

impl Serialize for Salt {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&BASE64.encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = BASE64.decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; HALF_STATE_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            serde::de::Error::invalid_length(bytes.len(), &"48 bytes")
        })?;
        Ok(Self(arr))
    }
}

// ============================================
// HalfStateKey
// ============================================

/// Ephemeral 48-byte cipher key + IV generated fresh for each handshake.
///
/// It only ever encrypts the sender's [`KeysBlock`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HalfStateKey([u8; HALF_STATE_KEY_LEN]);

impl HalfStateKey {
    /// Generates a fresh random half-state key.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; HALF_STATE_KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Creates a half-state key from exactly 48 bytes.
    ///
    /// # Errors
    /// `InvalidLength` if `bytes` is not 48 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; HALF_STATE_KEY_LEN] = bytes.try_into().map_err(|_| {
            rootlink_common::CommonError::invalid_length(HALF_STATE_KEY_LEN, bytes.len())
        })?;
        Ok(Self(arr))
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HALF_STATE_KEY_LEN] {
        &self.0
    }

    /// Returns this key XORed with `salt`. Applying the same salt twice
    /// yields the original key.
    #[must_use]
    pub fn salted(&self, salt: &Salt) -> Self {
        let mut out = [0u8; HALF_STATE_KEY_LEN];
        for (o, (k, s)) in out.iter_mut().zip(self.0.iter().zip(salt.0.iter())) {
            *o = k ^ s;
        }
        Self(out)
    }

    /// Cipher key and IV used to seal the keys block.
    #[must_use]
    pub fn stream_key(&self) -> StreamKey {
        StreamKey::from_parts(&self.0[..CIPHER_KEY_LEN], &self.0[CIPHER_KEY_LEN..])
    }
}

impl PartialEq for HalfStateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for HalfStateKey {}

impl fmt::Debug for HalfStateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HalfStateKey([REDACTED])")
    }
}

// ============================================
// KeysBlock
// ============================================

/// 80-byte secret for one direction: cipher key, IV and authentication key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeysBlock([u8; KEYS_BLOCK_LEN]);

impl KeysBlock {
    /// Generates a fresh random keys block.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; KEYS_BLOCK_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Creates a keys block from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEYS_BLOCK_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEYS_BLOCK_LEN] {
        &self.0
    }

    /// Bytes `[0:48)`: cipher key and IV.
    #[must_use]
    pub fn stream_key(&self) -> StreamKey {
        StreamKey::from_parts(
            &self.0[..CIPHER_KEY_LEN],
            &self.0[CIPHER_KEY_LEN..HALF_STATE_KEY_LEN],
        )
    }

    /// Bytes `[48:80)`: authentication key.
    #[must_use]
    pub fn auth_key(&self) -> AuthKey {
        let mut key = [0u8; AUTH_KEY_LEN];
        key.copy_from_slice(&self.0[HALF_STATE_KEY_LEN..]);
        AuthKey(key)
    }
}

impl fmt::Debug for KeysBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeysBlock([REDACTED])")
    }
}

// ============================================
// StreamKey / AuthKey
// ============================================

/// AES-256 key and CTR initial counter block.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct StreamKey {
    key: [u8; CIPHER_KEY_LEN],
    iv: [u8; CIPHER_IV_LEN],
}

impl StreamKey {
    /// Creates a stream key from a key and an IV.
    #[must_use]
    pub const fn new(key: [u8; CIPHER_KEY_LEN], iv: [u8; CIPHER_IV_LEN]) -> Self {
        Self { key, iv }
    }

    fn from_parts(key: &[u8], iv: &[u8]) -> Self {
        let mut out = Self::new([0u8; CIPHER_KEY_LEN], [0u8; CIPHER_IV_LEN]);
        out.key.copy_from_slice(key);
        out.iv.copy_from_slice(iv);
        out
    }

    /// Cipher key bytes.
    #[must_use]
    pub const fn key(&self) -> &[u8; CIPHER_KEY_LEN] {
        &self.key
    }

    /// IV bytes.
    #[must_use]
    pub const fn iv(&self) -> &[u8; CIPHER_IV_LEN] {
        &self.iv
    }
}

impl PartialEq for StreamKey {
    fn eq(&self, other: &Self) -> bool {
        (self.key.ct_eq(&other.key) & self.iv.ct_eq(&other.iv)).into()
    }
}

impl Eq for StreamKey {}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamKey([REDACTED])")
    }
}

/// HMAC-SHA256 key of one direction's checkpoints.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AuthKey([u8; AUTH_KEY_LEN]);

impl AuthKey {
    /// Creates an authentication key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; AUTH_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; AUTH_KEY_LEN] {
        &self.0
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for AuthKey {}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthKey([REDACTED])")
    }
}

// ============================================
// DirectionalKeys
// ============================================

/// Keys of both directions as seen from one side of a session.
#[derive(Clone, PartialEq, Eq)]
pub struct DirectionalKeys {
    /// Encrypts what we send.
    pub outgoing: StreamKey,
    /// Decrypts what we receive.
    pub incoming: StreamKey,
    /// Authenticates the checkpoints we write.
    pub outgoing_auth: AuthKey,
    /// Verifies the checkpoints we read.
    pub incoming_auth: AuthKey,
}

impl DirectionalKeys {
    /// Assigns the roles of the two keys blocks of a handshake.
    ///
    /// From the block this side `generated`: the cipher key/IV encrypt our
    /// outgoing stream and the authentication key verifies the peer.
    /// From the block `received` from the peer: the cipher key/IV decrypt
    /// the incoming stream and the authentication key signs our checkpoints.
    #[must_use]
    pub fn assign(generated: &KeysBlock, received: &KeysBlock) -> Self {
        Self {
            outgoing: generated.stream_key(),
            incoming_auth: generated.auth_key(),
            incoming: received.stream_key(),
            outgoing_auth: received.auth_key(),
        }
    }
}

impl fmt::Debug for DirectionalKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectionalKeys").finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_salt_xor_is_involutive() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            let key = HalfStateKey::generate(&mut rng);
            let salt = Salt::generate(&mut rng);
            let wrapped = key.salted(&salt);
            assert_ne!(wrapped, key);
            assert_eq!(wrapped.salted(&salt), key);
        }
    }

    #[test]
    fn test_zero_salt_is_identity() {
        let mut rng = StdRng::seed_from_u64(1);
        let key = HalfStateKey::generate(&mut rng);
        assert_eq!(key.salted(&Salt::zero()), key);
    }

    #[test]
    fn test_keys_block_layout() {
        let mut bytes = [0u8; KEYS_BLOCK_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = u8::try_from(i).unwrap();
        }
        let block = KeysBlock::from_bytes(bytes);
        assert_eq!(block.stream_key().key()[0], 0);
        assert_eq!(block.stream_key().iv()[0], 32);
        assert_eq!(block.auth_key().as_bytes()[0], 48);
        assert_eq!(block.auth_key().as_bytes()[31], 79);
    }

    #[test]
    fn test_directional_keys_mirror_each_other() {
        let mut rng = StdRng::seed_from_u64(42);
        let guest_block = KeysBlock::generate(&mut rng);
        let host_block = KeysBlock::generate(&mut rng);

        let guest = DirectionalKeys::assign(&guest_block, &host_block);
        let host = DirectionalKeys::assign(&host_block, &guest_block);

        assert_eq!(guest.outgoing, host.incoming);
        assert_eq!(guest.incoming, host.outgoing);
        assert_eq!(guest.incoming_auth, host.outgoing_auth);
        assert_eq!(guest.outgoing_auth, host.incoming_auth);
        assert_ne!(guest.outgoing, guest.incoming);
    }

    #[test]
    fn test_generated_block_authenticates_incoming() {
        let mut rng = StdRng::seed_from_u64(7);
        let generated = KeysBlock::generate(&mut rng);
        let received = KeysBlock::generate(&mut rng);

        let keys = DirectionalKeys::assign(&generated, &received);

        assert_eq!(keys.outgoing, generated.stream_key());
        assert_eq!(keys.incoming_auth, generated.auth_key());
        assert_eq!(keys.incoming, received.stream_key());
        assert_eq!(keys.outgoing_auth, received.auth_key());
        assert_ne!(keys.incoming_auth, keys.outgoing_auth);
    }

    #[test]
    fn test_half_state_key_length_checked() {
        assert!(HalfStateKey::from_slice(&[0u8; 47]).is_err());
        assert!(HalfStateKey::from_slice(&[0u8; 48]).is_ok());
    }

    #[test]
    fn test_salt_serde_base64() {
        let salt = Salt::from_bytes([0xAB; HALF_STATE_KEY_LEN]);
        let json = serde_json::to_string(&salt).unwrap();
        let back: Salt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, salt);
        assert!(serde_json::from_str::<Salt>("\"AAAA\"").is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = HalfStateKey::from_slice(&[0x41; 48]).unwrap();
        assert_eq!(format!("{key:?}"), "HalfStateKey([REDACTED])");
    }

    #[test]
    fn test_small_rsa_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            IdentityKeyPair::generate(&mut rng, 1024),
            Err(CoreError::KeyGeneration { .. })
        ));
    }
}
