// ============================================
// File: crates/rootlink-core/src/framing/reader.rs
// ============================================
//! Read half of the framing stream pair.

use std::io::{self, Read};

use hmac::Mac;
use tracing::warn;

use super::{new_mac, FramingFault, HmacSha256, CHECKPOINT_FLAG, PAD_MASK};
use crate::crypto::AuthKey;
use crate::error::Result;
use crate::protocol::{BLOCK_PAYLOAD, CONTROL_STEP, DIGEST_LEN};

/// Releases data only after the checkpoint covering it verified.
///
/// Partially received blocks survive `WouldBlock`/`TimedOut` errors from
/// the inner reader, so a read timeout does not desynchronize the stream.
pub struct FramedReader<R> {
    inner: R,
    mac: HmacSha256,
    max_step_length: usize,
    /// Current block (or digest) being received.
    block: [u8; CONTROL_STEP],
    filled: usize,
    awaiting_digest: bool,
    /// Data received since the last checkpoint, not yet verified.
    pending: Vec<u8>,
    /// Raw bytes received since the last checkpoint.
    unverified: usize,
    /// Verified data not yet handed to the caller.
    trusted: Vec<u8>,
    consumed: usize,
    fault: Option<FramingFault>,
}

impl<R: Read> FramedReader<R> {
    /// Wraps `inner`, verifying checkpoints with `key`.
    ///
    /// # Errors
    /// `KeyFormat` if the checkpoint key is rejected.
    pub fn new(inner: R, key: &AuthKey, max_step_length: usize) -> Result<Self> {
        Ok(Self {
            inner,
            mac: new_mac(key)?,
            max_step_length,
            block: [0u8; CONTROL_STEP],
            filled: 0,
            awaiting_digest: false,
            pending: Vec::new(),
            unverified: 0,
            trusted: Vec::new(),
            consumed: 0,
            fault: None,
        })
    }

    /// Returns the permanent fault, if the stream has faulted.
    pub fn fault(&self) -> Option<FramingFault> {
        self.fault
    }

    /// Returns a reference to the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwraps the reader, dropping buffered data.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fail(&mut self, fault: FramingFault) -> io::Error {
        if fault == FramingFault::Tampered {
            warn!(buffered = self.pending.len(), "Framing checkpoint mismatch");
        }
        self.fault = Some(fault);
        self.pending.clear();
        self.trusted.clear();
        self.consumed = 0;
        fault.into_io()
    }

    /// Fills `block[..want]`. Returns `false` on end of stream before the
    /// first byte of the unit.
    fn fill(&mut self, want: usize) -> io::Result<bool> {
        while self.filled < want {
            match self.inner.read(&mut self.block[self.filled..want]) {
                Ok(0) => {
                    if self.filled == 0 {
                        return Ok(false);
                    }
                    return Err(self.fail(FramingFault::Truncated));
                }
                Ok(n) => self.filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    /// Receives units until verified data is available or the stream
    /// cleanly ends. Returns `false` on clean end of stream.
    fn advance(&mut self) -> io::Result<bool> {
        loop {
            if self.awaiting_digest {
                if !self.fill(DIGEST_LEN)? {
                    return Err(self.fail(FramingFault::Truncated));
                }
                self.filled = 0;
                self.awaiting_digest = false;
                if self.mac.verify_slice_reset(&self.block[..DIGEST_LEN]).is_err() {
                    return Err(self.fail(FramingFault::Tampered));
                }
                self.unverified = 0;
                std::mem::swap(&mut self.trusted, &mut self.pending);
                self.pending.clear();
                self.consumed = 0;
                if !self.trusted.is_empty() {
                    return Ok(true);
                }
                continue;
            }

            if !self.fill(CONTROL_STEP)? {
                if self.unverified == 0 {
                    return Ok(false);
                }
                return Err(self.fail(FramingFault::Truncated));
            }
            self.filled = 0;
            self.unverified += CONTROL_STEP;
            if self.unverified > self.max_step_length {
                return Err(self.fail(FramingFault::StepOverflow));
            }

            self.mac.update(&self.block);
            let control = self.block[BLOCK_PAYLOAD];
            let data_len = if control & CHECKPOINT_FLAG == 0 {
                BLOCK_PAYLOAD
            } else {
                self.awaiting_digest = true;
                BLOCK_PAYLOAD - usize::from(control & PAD_MASK)
            };
            self.pending.extend_from_slice(&self.block[..data_len]);
        }
    }
}

impl<R: Read> Read for FramedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(fault) = self.fault {
            return Err(fault.into_io());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.consumed == self.trusted.len() && !self.advance()? {
            return Ok(0);
        }

        let available = &self.trusted[self.consumed..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consumed += n;
        Ok(n)
    }
}
