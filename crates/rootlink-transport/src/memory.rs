// ============================================
// File: crates/rootlink-transport/src/memory.rs
// ============================================
//! # In-Memory Pipe
//!
//! ## Creation Reason
//! Lets handshakes and sessions be tested without sockets: two
//! `MemoryConnection`s wired back to back, each driven from its own thread.
//!
//! ## Main Functionality
//! - `pipe`: creates a connected pair
//! - Blocking reads with optional timeout (`TimedOut`)
//! - `shutdown`: readers drain then see EOF, writers get `BrokenPipe`
//! - `corrupt_outgoing`: flips bits at a given stream offset, for tamper tests
//!
//! ## ⚠️ Important Note for Next Developer
//! - Buffers are unbounded; this is a test double, not a production path
//!
//! ## Last Modified
//! v0.1.0 - Initial in-memory pipe

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::Connection;

// ============================================
// Channel
// ============================================

#[derive(Default)]
struct ChannelState {
    buffer: VecDeque<u8>,
    closed: bool,
    /// Total bytes ever written, the offset of the next byte.
    written: u64,
    /// Pending bit flips keyed by stream offset.
    corruptions: BTreeMap<u64, u8>,
}

/// One direction of the pipe.
#[derive(Default)]
struct Channel {
    state: Mutex<ChannelState>,
    ready: Condvar,
}

impl Channel {
    fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }
}

// ============================================
// MemoryConnection
// ============================================

/// One end of an in-memory duplex pipe.
pub struct MemoryConnection {
    label: String,
    peer_label: String,
    incoming: Arc<Channel>,
    outgoing: Arc<Channel>,
    timeout: Arc<Mutex<Option<Duration>>>,
    open: AtomicBool,
}

/// Creates two connected ends labelled `a` and `b`.
#[must_use]
pub fn pipe(a: &str, b: &str) -> (MemoryConnection, MemoryConnection) {
    let a_to_b = Arc::new(Channel::default());
    let b_to_a = Arc::new(Channel::default());
    let end = |label: &str, peer: &str, incoming: &Arc<Channel>, outgoing: &Arc<Channel>| {
        MemoryConnection {
            label: label.to_owned(),
            peer_label: peer.to_owned(),
            incoming: Arc::clone(incoming),
            outgoing: Arc::clone(outgoing),
            timeout: Arc::new(Mutex::new(None)),
            open: AtomicBool::new(true),
        }
    };
    (
        end(a, b, &b_to_a, &a_to_b),
        end(b, a, &a_to_b, &b_to_a),
    )
}

impl MemoryConnection {
    /// Label of this end.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// XORs `mask` into the outgoing byte at stream `offset` once it is
    /// written. Offsets already written are ignored.
    pub fn corrupt_outgoing(&self, offset: u64, mask: u8) {
        self.outgoing.state.lock().corruptions.insert(offset, mask);
    }

    /// Total bytes written by this end so far.
    #[must_use]
    pub fn bytes_sent(&self) -> u64 {
        self.outgoing.state.lock().written
    }
}

impl Connection for MemoryConnection {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(&self) -> Result<(MemoryReader, MemoryWriter)> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        Ok((
            MemoryReader {
                channel: Arc::clone(&self.incoming),
                timeout: Arc::clone(&self.timeout),
            },
            MemoryWriter {
                channel: Arc::clone(&self.outgoing),
            },
        ))
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        if timeout == Some(Duration::ZERO) {
            return Err(TransportError::invalid_config(
                "read_timeout",
                "zero duration, use None for no timeout",
            ));
        }
        *self.timeout.lock() = timeout;
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            trace!(label = %self.label, "Memory pipe shut down");
            self.incoming.close();
            self.outgoing.close();
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn peer(&self) -> String {
        format!("memory:{}", self.peer_label)
    }
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("label", &self.label)
            .field("peer", &self.peer_label)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

// ============================================
// Halves
// ============================================

/// Receiving half of a [`MemoryConnection`].
pub struct MemoryReader {
    channel: Arc<Channel>,
    timeout: Arc<Mutex<Option<Duration>>>,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let deadline = self.timeout.lock().map(|limit| Instant::now() + limit);
        let mut state = self.channel.state.lock();
        loop {
            if !state.buffer.is_empty() {
                let n = buf.len().min(state.buffer.len());
                for (slot, byte) in buf.iter_mut().zip(state.buffer.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if state.closed {
                return Ok(0);
            }
            match deadline {
                Some(deadline) => {
                    if self.channel.ready.wait_until(&mut state, deadline).timed_out()
                        && state.buffer.is_empty()
                        && !state.closed
                    {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "memory pipe read timed out",
                        ));
                    }
                }
                None => self.channel.ready.wait(&mut state),
            }
        }
    }
}

/// Sending half of a [`MemoryConnection`].
pub struct MemoryWriter {
    channel: Arc<Channel>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.channel.state.lock();
        if state.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "memory pipe closed",
            ));
        }
        let start = state.written;
        for (offset, &byte) in (start..).zip(buf) {
            let byte = match state.corruptions.remove(&offset) {
                Some(mask) => byte ^ mask,
                None => byte,
            };
            state.buffer.push_back(byte);
        }
        state.written += buf.len() as u64;
        drop(state);
        self.channel.ready.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================
// Tests
// ============================================
