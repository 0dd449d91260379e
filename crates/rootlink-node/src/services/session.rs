// ============================================
// File: crates/rootlink-node/src/services/session.rs
// ============================================
//! # Session
//!
//! ## Creation Reason
//! The connection-level object applications use: it runs the handshake,
//! then exchanges typed records over the secured channel.
//!
//! ## Main Functionality
//! - `Session::connect`: guest side over TCP
//! - `Session::accept`: host side over an accepted connection
//! - `Session::establish`: either role over any `Connection`
//! - `write` / `read` / `flush` / `close`, `is_connected` / `is_closed`
//!
//! ## Session Lifecycle
//! ```text
//! ┌──────────┐   handshake   ┌─────────┐
//! │  (none)  │ ────────────► │  Ready  │
//! └──────────┘               └────┬────┘
//!                                 │
//!                    ┌────────────┴────────────┐
//!                    │                         │
//!                 close()               read/write fault
//!                    │                         │
//!                    ▼                         ▼
//!              ┌──────────┐              ┌──────────┐
//!              │  Closed  │              │  Failed  │
//!              └──────────┘              └──────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Each direction has its own lock: one thread may read while another
//!   writes, but two writers (or two readers) serialize
//! - `write` sets the connection's stepped flag, `read` clears it
//! - Any read or write error is fatal: the session moves to `Failed` and
//!   the connection is shut down
//!
//! ## Last Modified
//! v0.1.0 - Initial session implementation

use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use rootlink_common::Charset;
use rootlink_core::crypto::DirectionalKeys;
use rootlink_transport::{Connection, TcpConnection, Throttle, Throttled};

use crate::error::{NodeError, Result};
use crate::services::handshake::{
    Handshake, HandshakeContext, HandshakeState, PeerIdentity, Role, SecureReader, SecureWriter,
};
use crate::services::marshal::{Record, RecordReader, RecordWriter};

/// How long `close` waits for a writer busy on another thread.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// A secured, handshaken connection exchanging typed records.
pub struct Session<C: Connection> {
    connection: C,
    role: Role,
    peer: PeerIdentity,
    keys: DirectionalKeys,
    charset: Charset,
    state: Mutex<HandshakeState>,
    writer: Mutex<Option<RecordWriter<SecureWriter<C::Writer>>>>,
    reader: Mutex<Option<RecordReader<SecureReader<C::Reader>>>>,
}

impl Session<Throttled<TcpConnection>> {
    /// Connects to `addr` as guest and runs the handshake.
    ///
    /// # Errors
    /// Connection failure or any handshake fault.
    pub fn connect(
        ctx: &HandshakeContext,
        addr: &str,
        charset: Charset,
        throttle: Throttle,
    ) -> Result<Self> {
        let tcp = TcpConnection::connect(addr, ctx.settings().initiation_timeout)?;
        Self::establish(ctx, Throttled::new(tcp, throttle), Role::Guest, charset)
    }
}

impl<C: Connection> Session<C> {
    /// Runs the host side of the handshake on an accepted connection.
    ///
    /// # Errors
    /// Any handshake fault.
    pub fn accept(ctx: &HandshakeContext, connection: C) -> Result<Self> {
        Self::establish(ctx, connection, Role::Host, Charset::default())
    }

    /// Runs the handshake as `role`. `charset` is only used by a guest.
    ///
    /// # Errors
    /// Any handshake fault; the connection is shut down.
    pub fn establish(
        ctx: &HandshakeContext,
        connection: C,
        role: Role,
        charset: Charset,
    ) -> Result<Self> {
        let established = Handshake::new(ctx, &connection, role).run(charset)?;
        let charset = established.charset;
        Ok(Self {
            role,
            peer: established.peer,
            keys: established.keys,
            charset,
            state: Mutex::new(HandshakeState::Ready),
            writer: Mutex::new(Some(RecordWriter::new(established.writer, charset))),
            reader: Mutex::new(Some(RecordReader::new(established.reader, charset))),
            connection,
        })
    }

    // ========================================
    // Records
    // ========================================

    /// Queues records for the peer. Call [`Self::flush`] to send them.
    ///
    /// # Errors
    /// `SessionClosed`/`SessionFailed`, or the fault that failed the session.
    pub fn write<R: Record>(&self, records: &[R]) -> Result<()> {
        self.ensure_ready()?;
        self.connection.set_stepped(true);
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(NodeError::SessionClosed)?;
        writer.write(records).map_err(|e| self.fail("write", e))
    }

    /// Sends everything written so far, closing the framing checkpoint.
    ///
    /// # Errors
    /// As [`Self::write`].
    pub fn flush(&self) -> Result<()> {
        self.ensure_ready()?;
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(NodeError::SessionClosed)?;
        writer.flush().map_err(|e| self.fail("flush", e))
    }

    /// Blocks until the next record arrives; it must be a `T`.
    ///
    /// # Errors
    /// `SessionClosed`/`SessionFailed`, `PeerClosed`, or the fault that
    /// failed the session (tampering, unexpected record, timeout).
    pub fn read<T: Record>(&self) -> Result<T> {
        self.ensure_ready()?;
        self.connection.set_stepped(false);
        let mut guard = self.reader.lock();
        let reader = guard.as_mut().ok_or(NodeError::SessionClosed)?;
        reader.read::<T>().map_err(|e| self.fail("read", e))
    }

    /// Closes the session: the record writer first, then the connection.
    /// Writer errors are logged, not returned. Idempotent.
    ///
    /// # Errors
    /// Failure shutting the connection down.
    pub fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == HandshakeState::Closed {
                return Ok(());
            }
            *state = HandshakeState::Closed;
        }

        match self.writer.try_lock_for(CLOSE_GRACE) {
            Some(mut guard) => {
                if let Some(mut writer) = guard.take() {
                    if let Err(e) = writer.close() {
                        warn!(peer = %self.connection.peer(), error = %e, "Closing record writer failed");
                    }
                }
            }
            None => warn!(peer = %self.connection.peer(), "Record writer busy, closing anyway"),
        }

        let result = self.connection.shutdown();
        if let Some(mut guard) = self.reader.try_lock() {
            guard.take();
        }
        info!(role = %self.role, peer = %self.peer.certificate.alias().short(), "Session closed");
        result.map_err(NodeError::from)
    }

    // ========================================
    // State
    // ========================================

    /// `true` while the session is ready and the connection open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.state.lock() == HandshakeState::Ready && self.connection.is_open()
    }

    /// `true` once [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.state.lock() == HandshakeState::Closed
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        *self.state.lock()
    }

    /// Our role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// The validated peer.
    #[must_use]
    pub const fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    /// Negotiated record charset.
    #[must_use]
    pub const fn charset(&self) -> Charset {
        self.charset
    }

    /// Directional keys, for diagnostics and tests.
    #[must_use]
    pub const fn keys(&self) -> &DirectionalKeys {
        &self.keys
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &C {
        &self.connection
    }

    fn ensure_ready(&self) -> Result<()> {
        match *self.state.lock() {
            HandshakeState::Ready => Ok(()),
            HandshakeState::Failed => Err(NodeError::SessionFailed),
            _ => Err(NodeError::SessionClosed),
        }
    }

    fn fail(&self, operation: &str, error: NodeError) -> NodeError {
        {
            let mut state = self.state.lock();
            if *state != HandshakeState::Ready {
                return error;
            }
            *state = HandshakeState::Failed;
        }
        if error.is_suspicious() {
            warn!(operation, peer = %self.connection.peer(), error = %error, "Session failed, possible tampering");
        } else {
            debug!(operation, peer = %self.connection.peer(), error = %error, "Session failed");
        }
        if let Err(e) = self.connection.shutdown() {
            debug!(error = %e, "Shutdown after session failure");
        }
        error
    }
}

impl<C: Connection> Drop for Session<C> {
    fn drop(&mut self) {
        if !self.state.get_mut().is_terminal() {
            if let Err(e) = self.close() {
                debug!(error = %e, "Close on drop failed");
            }
        }
    }
}

impl<C: Connection> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("peer", self.peer.certificate.alias())
            .field("charset", &self.charset)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
