// ============================================
// File: crates/rootlink-core/src/framing/writer.rs
// ============================================
//! Write half of the framing stream pair.

use std::io::{self, Write};

use hmac::Mac;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use super::{new_mac, HmacSha256, CHECKPOINT_FLAG, PAD_MASK};
use crate::crypto::AuthKey;
use crate::error::Result;
use crate::protocol::BLOCK_PAYLOAD;

/// Emits data in 128-byte blocks with a checkpoint every `step_length` bytes.
///
/// The control byte closing a full block is deferred until the next write
/// or flush, so a flush right after a full block becomes a checkpoint with
/// no padding.
pub struct FramedWriter<W> {
    inner: W,
    mac: HmacSha256,
    rng: StdRng,
    step_length: usize,
    /// Bytes emitted since the last digest, control bytes included.
    since_checkpoint: usize,
    /// Data bytes in the current block.
    block_fill: usize,
    scratch: Vec<u8>,
    broken: bool,
}

impl<W: Write> FramedWriter<W> {
    /// Wraps `inner`, seeding the padding generator from the OS.
    ///
    /// # Errors
    /// `KeyFormat` if the checkpoint key is rejected.
    pub fn new(inner: W, key: &AuthKey, step_length: usize) -> Result<Self> {
        Self::with_rng(inner, key, step_length, StdRng::from_entropy())
    }

    /// Wraps `inner` using `rng` for keep-going bytes and padding.
    ///
    /// # Errors
    /// `KeyFormat` if the checkpoint key is rejected.
    pub fn with_rng(inner: W, key: &AuthKey, step_length: usize, rng: StdRng) -> Result<Self> {
        Ok(Self {
            inner,
            mac: new_mac(key)?,
            rng,
            step_length,
            since_checkpoint: 0,
            block_fill: 0,
            scratch: Vec::with_capacity(256),
            broken: false,
        })
    }

    /// Returns a reference to the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns a mutable reference to the wrapped writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwraps the writer, dropping any unflushed block.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Appends the control byte closing the current block to `scratch`,
    /// with padding and digest when `checkpoint` is set.
    fn close_block(&mut self, checkpoint: bool) {
        let pad = BLOCK_PAYLOAD - self.block_fill;
        if checkpoint {
            let start = self.scratch.len();
            self.scratch.resize(start + pad, 0);
            self.rng.fill_bytes(&mut self.scratch[start..]);
            // pad < 128 always
            #[allow(clippy::cast_possible_truncation)]
            let control = CHECKPOINT_FLAG | pad as u8;
            self.scratch.push(control);
            let tail = self.scratch.len();
            self.mac.update(&self.scratch[start..tail]);
            let digest = self.mac.finalize_reset().into_bytes();
            self.scratch.extend_from_slice(&digest);
            self.since_checkpoint = 0;
        } else {
            #[allow(clippy::cast_possible_truncation)]
            let marker = (self.rng.next_u32() as u8) & PAD_MASK;
            self.mac.update(&[marker]);
            self.scratch.push(marker);
            self.since_checkpoint += 1;
        }
        self.block_fill = 0;
    }

    fn emit(&mut self) -> io::Result<()> {
        if self.scratch.is_empty() {
            return Ok(());
        }
        let result = self.inner.write_all(&self.scratch);
        self.scratch.clear();
        if result.is_err() {
            self.broken = true;
        }
        result
    }

    fn check_usable(&self) -> io::Result<()> {
        if self.broken {
            Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "framed stream broken by an earlier write failure",
            ))
        } else {
            Ok(())
        }
    }
}

impl<W: Write> Write for FramedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_usable()?;
        if buf.is_empty() {
            return Ok(0);
        }

        let mut rest = buf;
        while !rest.is_empty() {
            if self.block_fill == BLOCK_PAYLOAD {
                let checkpoint = self.since_checkpoint + 1 >= self.step_length;
                self.close_block(checkpoint);
            }
            let take = rest.len().min(BLOCK_PAYLOAD - self.block_fill);
            let (chunk, tail) = rest.split_at(take);
            self.mac.update(chunk);
            self.scratch.extend_from_slice(chunk);
            self.block_fill += take;
            self.since_checkpoint += take;
            rest = tail;
        }
        self.emit()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check_usable()?;
        if self.since_checkpoint > 0 {
            self.close_block(true);
            self.emit()?;
        }
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broken_writer_stays_broken() {
        struct Failing;
        impl Write for Failing {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = FramedWriter::new(Failing, &AuthKey::from_bytes([1; 32]), 4096).unwrap();
        assert!(writer.write(b"abc").is_err());
        let err = writer.write(b"abc").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
