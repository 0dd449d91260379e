// ============================================
// File: crates/rootlink-node/src/services/handshake.rs
// ============================================
//! # Handshake Service
//!
//! ## Creation Reason
//! Orchestrates the handshake that turns a raw connection into two
//! independently keyed, tamper-evident one-way channels.
//!
//! ## Main Functionality
//! - `HandshakeContext`: identity, trust engine, settings and randomness
//!   owned by the node and shared by all its sessions
//! - `Handshake`: one run of the shared script for a given `Role`
//! - `Established`: the wrapped streams and keys produced on success
//!
//! ## Handshake Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Start                                                       │
//! │    │  guest → version, host → reply                          │
//! │    ▼                                                         │
//! │  VersionOk                                                   │
//! │    │  guest identity → host (chain on request), then reverse │
//! │    ▼                                                         │
//! │  IdentityOk                                                  │
//! │    │  RSA-OAEP wrapped half-state keys, guest first          │
//! │    ▼                                                         │
//! │  HalfKeyExchanged                                            │
//! │    │  80-byte keys blocks sealed with own half key           │
//! │    ▼                                                         │
//! │  KeysExchanged                                               │
//! │    │  cipher + framing wrap of both directions               │
//! │    ▼                                                         │
//! │  Wrapped                                                     │
//! │    │  guest → charset code over the framed channel           │
//! │    ▼                                                         │
//! │  Ready                                                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Handling
//! Any failure moves the handshake to `Failed` and shuts the connection
//! down. Refusals are announced with `REPLY_REJECT` on a best-effort basis
//! before closing.
//!
//! ## ⚠️ Important Note for Next Developer
//! - For every exchange the guest sends first and the host receives first;
//!   changing that order deadlocks both sides
//! - Salts are taken from the peer's cadastre as stored; the handshake
//!   never rotates them
//! - There is no key confirmation: the guest reaches `Ready` as soon as
//!   its charset checkpoint is sent. A mis-keyed host (mismatched salts,
//!   for instance) only notices at that checkpoint, either as `Tampered`
//!   or after waiting out `initiation_timeout`
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake service

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use rootlink_common::Charset;
use rootlink_core::crypto::{
    open_keys_block, seal_keys_block, unwrap_half_key, wrap_half_key, CipherReader,
    CipherWriter, DirectionalKeys, HalfStateKey, IdentityKeyPair, KeysBlock,
};
use rootlink_core::framing::{FramedReader, FramedWriter};
use rootlink_core::protocol::wire::{
    read_array, read_der, read_len_prefixed, read_u8, write_der, write_len_prefixed, write_u8,
};
use rootlink_core::protocol::{
    ProtocolSettings, KEYS_BLOCK_LEN, MAX_CERTIFICATE_LEN, MAX_WRAPPED_KEY_LEN, REPLY_OK,
    REPLY_REJECT, REPLY_SEND_CHAIN,
};
use rootlink_core::trust::{Cadastre, Certificate, IssuedIdentity, TrustEngine};
use rootlink_core::CoreError;
use rootlink_transport::Connection;

use crate::error::{NodeError, Result};

// ============================================
// Role & State
// ============================================

/// Side of the connection a node plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiator; sends first in every exchange.
    Guest,
    /// Acceptor; receives first in every exchange.
    Host,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => write!(f, "guest"),
            Self::Host => write!(f, "host"),
        }
    }
}

/// Handshake and session lifecycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakeState {
    /// Nothing exchanged yet.
    Start,
    /// Protocol versions agree.
    VersionOk,
    /// Both identities are trusted.
    IdentityOk,
    /// Half-state keys exchanged.
    HalfKeyExchanged,
    /// Keys blocks exchanged and roles assigned.
    KeysExchanged,
    /// Both directions wrapped with cipher and framing.
    Wrapped,
    /// Charset agreed; records may flow.
    Ready,
    /// Terminal: a step or a later read/write failed.
    Failed,
    /// Terminal: closed by the application.
    Closed,
}

impl HandshakeState {
    /// Returns `true` for `Failed` and `Closed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================
// HandshakeContext
// ============================================

/// Everything a node needs to run handshakes, shared by its sessions.
pub struct HandshakeContext {
    identity: IdentityKeyPair,
    certificate: Certificate,
    chain: Vec<Certificate>,
    trust: Arc<TrustEngine>,
    settings: ProtocolSettings,
    rng: Mutex<StdRng>,
}

impl HandshakeContext {
    /// Builds a context from an issued identity.
    ///
    /// # Errors
    /// - `ConfigInvalid` if the settings are inconsistent, or the chain or
    ///   trust engine disagree with `settings.path_length`
    /// - `KeyFormat` if the key does not match the certificate
    pub fn new(
        identity: IssuedIdentity,
        trust: Arc<TrustEngine>,
        settings: ProtocolSettings,
    ) -> Result<Self> {
        settings.validate()?;
        if identity.chain.len() + 1 != settings.path_length {
            return Err(NodeError::config_invalid(
                "identity.chain",
                format!(
                    "{} issuer certificates for a path length of {}",
                    identity.chain.len(),
                    settings.path_length
                ),
            ));
        }
        if trust.path_length() != settings.path_length {
            return Err(NodeError::config_invalid(
                "protocol.path_length",
                format!("trust engine expects {}", trust.path_length()),
            ));
        }
        if !identity.key.matches(&identity.certificate.public_key()?) {
            return Err(CoreError::key_format(
                "private key does not match the end-point certificate",
            )
            .into());
        }
        Ok(Self {
            identity: identity.key,
            certificate: identity.certificate,
            chain: identity.chain,
            trust,
            settings,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Replaces the random source (deterministic tests).
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Our end-point certificate.
    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The shared trust engine.
    #[must_use]
    pub fn trust(&self) -> &Arc<TrustEngine> {
        &self.trust
    }

    /// Protocol settings used by every handshake.
    #[must_use]
    pub fn settings(&self) -> &ProtocolSettings {
        &self.settings
    }
}

impl fmt::Debug for HandshakeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeContext")
            .field("certificate", &self.certificate)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================
// Handshake outcome
// ============================================

/// The validated peer.
#[derive(Debug, Clone)]
pub struct PeerIdentity {
    /// Peer end-point certificate.
    pub certificate: Certificate,
    /// Trust record the peer was accepted under.
    pub cadastre: Cadastre,
}

/// Outgoing stream of a ready session: framing over the cipher.
pub type SecureWriter<W> = FramedWriter<CipherWriter<W>>;

/// Incoming stream of a ready session: framing over the cipher.
pub type SecureReader<R> = FramedReader<CipherReader<R>>;

/// Result of a successful handshake.
pub struct Established<R, W> {
    /// Verified, deciphered incoming stream.
    pub reader: SecureReader<R>,
    /// Framed, ciphered outgoing stream.
    pub writer: SecureWriter<W>,
    /// Keys of both directions.
    pub keys: DirectionalKeys,
    /// Who we are talking to.
    pub peer: PeerIdentity,
    /// Negotiated record charset.
    pub charset: Charset,
}

// ============================================
// Handshake
// ============================================

/// One handshake over `connection`, run once.
pub struct Handshake<'a, C: Connection> {
    ctx: &'a HandshakeContext,
    connection: &'a C,
    role: Role,
    state: HandshakeState,
}

impl<'a, C: Connection> Handshake<'a, C> {
    /// Prepares a handshake; nothing is exchanged until [`Self::run`].
    pub fn new(ctx: &'a HandshakeContext, connection: &'a C, role: Role) -> Self {
        Self {
            ctx,
            connection,
            role,
            state: HandshakeState::Start,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> HandshakeState {
        self.state
    }

    /// Runs every step. `charset` is proposed by a guest; a host adopts
    /// whatever the guest proposes.
    ///
    /// # Errors
    /// Any step failure; the connection is shut down before returning.
    pub fn run(&mut self, charset: Charset) -> Result<Established<C::Reader, C::Writer>> {
        if self.state != HandshakeState::Start {
            return Err(CoreError::invalid_state("handshake", "a fresh handshake").into());
        }
        match self.drive(charset) {
            Ok(established) => Ok(established),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn drive(&mut self, charset: Charset) -> Result<Established<C::Reader, C::Writer>> {
        let ctx = self.ctx;
        let settings = &ctx.settings;
        self.connection.set_read_timeout(settings.initiation_timeout)?;
        let (mut reader, mut writer) = self.connection.split()?;

        self.exchange_versions(&mut reader, &mut writer)?;
        self.advance(HandshakeState::VersionOk);

        let peer = self.exchange_identities(&mut reader, &mut writer)?;
        self.advance(HandshakeState::IdentityOk);

        let (own_half, peer_half) = self.exchange_half_keys(&peer, &mut reader, &mut writer)?;
        self.advance(HandshakeState::HalfKeyExchanged);

        let keys = self.exchange_keys_blocks(&own_half, &peer_half, &mut reader, &mut writer)?;
        drop((own_half, peer_half));
        self.advance(HandshakeState::KeysExchanged);

        let mut writer = FramedWriter::new(
            CipherWriter::new(writer, &keys.outgoing),
            &keys.outgoing_auth,
            settings.step_length,
        )?;
        let mut reader = FramedReader::new(
            CipherReader::new(reader, &keys.incoming),
            &keys.incoming_auth,
            settings.max_step_length,
        )?;
        self.advance(HandshakeState::Wrapped);

        let charset = self.negotiate_charset(charset, &mut reader, &mut writer)?;
        self.connection.set_read_timeout(settings.io_timeout)?;
        self.advance(HandshakeState::Ready);

        info!(
            role = %self.role,
            peer = %peer.certificate.alias().short(),
            subject = %peer.certificate.subject(),
            charset = charset.name(),
            "Handshake completed successfully"
        );
        Ok(Established {
            reader,
            writer,
            keys,
            peer,
            charset,
        })
    }

    fn advance(&mut self, next: HandshakeState) {
        debug!(role = %self.role, from = ?self.state, to = ?next, "Handshake step");
        self.state = next;
    }

    fn fail(&mut self, error: &NodeError) {
        warn!(
            role = %self.role,
            peer = %self.connection.peer(),
            state = ?self.state,
            error = %error,
            "Handshake failed"
        );
        self.state = HandshakeState::Failed;
        if let Err(e) = self.connection.shutdown() {
            debug!(error = %e, "Shutdown after failed handshake");
        }
    }

    // ========================================
    // Version
    // ========================================

    fn exchange_versions(&self, reader: &mut impl Read, writer: &mut impl Write) -> Result<()> {
        let ours = self.ctx.settings.version;
        match self.role {
            Role::Guest => {
                write_u8(writer, ours.as_u8())?;
                let reply = read_u8(reader)?;
                if reply != REPLY_OK {
                    return Err(CoreError::Rejected {
                        step: "version",
                        reply,
                    }
                    .into());
                }
            }
            Role::Host => {
                let theirs = read_u8(reader)?;
                if let Err(e) = ours.accept(theirs) {
                    refuse(writer);
                    return Err(e.into());
                }
                write_u8(writer, REPLY_OK)?;
            }
        }
        Ok(())
    }

    // ========================================
    // Identity
    // ========================================

    fn exchange_identities(
        &self,
        reader: &mut impl Read,
        writer: &mut impl Write,
    ) -> Result<PeerIdentity> {
        match self.role {
            Role::Guest => {
                self.present_identity(reader, writer)?;
                self.verify_peer_identity(reader, writer)
            }
            Role::Host => {
                let peer = self.verify_peer_identity(reader, writer)?;
                self.present_identity(reader, writer)?;
                Ok(peer)
            }
        }
    }

    fn present_identity(&self, reader: &mut impl Read, writer: &mut impl Write) -> Result<()> {
        write_der(writer, self.ctx.certificate.der())?;
        match read_u8(reader)? {
            REPLY_OK => return Ok(()),
            REPLY_SEND_CHAIN => {}
            reply => {
                return Err(CoreError::Rejected {
                    step: "identity",
                    reply,
                }
                .into())
            }
        }

        debug!(role = %self.role, "Peer requested our certificate chain");
        for certificate in &self.ctx.chain {
            writer.write_all(certificate.der())?;
        }
        writer.flush()?;
        match read_u8(reader)? {
            REPLY_OK => Ok(()),
            reply => Err(CoreError::Rejected {
                step: "certificate chain",
                reply,
            }
            .into()),
        }
    }

    fn verify_peer_identity(
        &self,
        reader: &mut impl Read,
        writer: &mut impl Write,
    ) -> Result<PeerIdentity> {
        let leaf = match read_der(reader, MAX_CERTIFICATE_LEN).and_then(Certificate::from_der) {
            Ok(leaf) => leaf,
            Err(e) => {
                refuse(writer);
                return Err(e.into());
            }
        };

        match self.ctx.trust.verify_end_point_certificate(&leaf) {
            Ok(cadastre) => {
                write_u8(writer, REPLY_OK)?;
                return Ok(PeerIdentity {
                    certificate: leaf,
                    cadastre,
                });
            }
            Err(CoreError::UntrustedCertificate { .. }) => {}
            Err(e) => {
                refuse(writer);
                return Err(e.into());
            }
        }

        write_u8(writer, REPLY_SEND_CHAIN)?;
        let mut chain = Vec::with_capacity(self.ctx.settings.path_length);
        chain.push(leaf);
        for _ in 1..self.ctx.settings.path_length {
            match read_der(reader, MAX_CERTIFICATE_LEN).and_then(Certificate::from_der) {
                Ok(certificate) => chain.push(certificate),
                Err(e) => {
                    refuse(writer);
                    return Err(e.into());
                }
            }
        }

        match self.ctx.trust.add_end_point_chain(&chain) {
            Ok(cadastre) => {
                write_u8(writer, REPLY_OK)?;
                Ok(PeerIdentity {
                    certificate: chain.swap_remove(0),
                    cadastre,
                })
            }
            Err(e) => {
                refuse(writer);
                Err(e.into())
            }
        }
    }

    // ========================================
    // Half-state keys
    // ========================================

    fn exchange_half_keys(
        &self,
        peer: &PeerIdentity,
        reader: &mut impl Read,
        writer: &mut impl Write,
    ) -> Result<(HalfStateKey, HalfStateKey)> {
        let own = HalfStateKey::generate(&mut *self.ctx.rng.lock());
        let peer_half = match self.role {
            Role::Guest => {
                self.send_half_key(peer, &own, writer)?;
                self.receive_half_key(peer, reader)?
            }
            Role::Host => {
                let received = self.receive_half_key(peer, reader)?;
                self.send_half_key(peer, &own, writer)?;
                received
            }
        };
        Ok((own, peer_half))
    }

    fn send_half_key(
        &self,
        peer: &PeerIdentity,
        own: &HalfStateKey,
        writer: &mut impl Write,
    ) -> Result<()> {
        let public = peer.certificate.public_key()?;
        let wrapped = wrap_half_key(
            &public,
            &peer.cadastre.salt_out,
            own,
            &mut *self.ctx.rng.lock(),
        )?;
        write_len_prefixed(writer, &wrapped)?;
        Ok(())
    }

    fn receive_half_key(&self, peer: &PeerIdentity, reader: &mut impl Read) -> Result<HalfStateKey> {
        let wrapped = read_len_prefixed(reader, MAX_WRAPPED_KEY_LEN)?;
        Ok(unwrap_half_key(
            &self.ctx.identity,
            &peer.cadastre.salt_in,
            &wrapped,
        )?)
    }

    // ========================================
    // Keys blocks
    // ========================================

    fn exchange_keys_blocks(
        &self,
        own_half: &HalfStateKey,
        peer_half: &HalfStateKey,
        reader: &mut impl Read,
        writer: &mut impl Write,
    ) -> Result<DirectionalKeys> {
        let generated = KeysBlock::generate(&mut *self.ctx.rng.lock());
        let sealed = seal_keys_block(own_half, &generated);

        let received = match self.role {
            Role::Guest => {
                writer.write_all(&sealed)?;
                writer.flush()?;
                read_array::<_, KEYS_BLOCK_LEN>(reader)?
            }
            Role::Host => {
                let received = read_array::<_, KEYS_BLOCK_LEN>(reader)?;
                writer.write_all(&sealed)?;
                writer.flush()?;
                received
            }
        };
        let received = open_keys_block(peer_half, &received);
        Ok(DirectionalKeys::assign(&generated, &received))
    }

    // ========================================
    // Charset
    // ========================================

    fn negotiate_charset(
        &self,
        proposed: Charset,
        reader: &mut impl Read,
        writer: &mut impl Write,
    ) -> Result<Charset> {
        match self.role {
            Role::Guest => {
                writer.write_all(&[proposed.code()])?;
                writer.flush()?;
                Ok(proposed)
            }
            Role::Host => Ok(Charset::from_code(read_u8(reader)?)?),
        }
    }
}

impl<C: Connection> fmt::Debug for Handshake<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("peer", &self.connection.peer())
            .finish_non_exhaustive()
    }
}

/// Best-effort refusal before the connection is dropped.
fn refuse(writer: &mut impl Write) {
    if let Err(e) = write_u8(writer, REPLY_REJECT) {
        debug!(error = %e, "Could not deliver refusal");
    }
}

// ============================================
// Tests
// ============================================
