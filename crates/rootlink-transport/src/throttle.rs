// ============================================
// File: crates/rootlink-transport/src/throttle.rs
// ============================================
//! # Rate Limiting
//!
//! ## Creation Reason
//! Caps the byte rate of a connection and carries the "stepped" flag the
//! session toggles at every change of direction.
//!
//! ## Main Functionality
//! - `Throttle`: token bucket shared by both directions
//! - `Throttled<C>`: wraps any [`Connection`], metering its halves
//!
//! ## ⚠️ Important Note for Next Developer
//! - A rate of 0 disables limiting; the stepped flag still works
//! - Setting the stepped flag from clear to set restarts the refill clock,
//!   so time spent waiting on the peer never becomes burst allowance
//! - Reads reserve up to the buffer length and refund what was not used
//!
//! ## Last Modified
//! v0.1.0 - Initial token bucket

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Result, TransportError};
use crate::traits::Connection;

// ============================================
// Throttle
// ============================================

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled: Instant,
}

/// Token bucket limiting bytes per second.
#[derive(Debug)]
pub struct Throttle {
    rate: u64,
    burst: u64,
    bucket: Mutex<Bucket>,
    stepped: AtomicBool,
}

impl Throttle {
    /// Creates a bucket refilled at `rate` bytes per second, holding at most
    /// `burst` bytes. A `rate` of 0 means unlimited.
    ///
    /// # Errors
    /// `InvalidConfig` if a limited bucket has a zero burst.
    pub fn new(rate: u64, burst: u64) -> Result<Self> {
        if rate > 0 && burst == 0 {
            return Err(TransportError::invalid_config(
                "burst",
                "must be positive when a rate is set",
            ));
        }
        #[allow(clippy::cast_precision_loss)]
        let tokens = burst as f64;
        Ok(Self {
            rate,
            burst,
            bucket: Mutex::new(Bucket {
                tokens,
                refilled: Instant::now(),
            }),
            stepped: AtomicBool::new(false),
        })
    }

    /// A throttle that never waits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            rate: 0,
            burst: 0,
            bucket: Mutex::new(Bucket {
                tokens: 0.0,
                refilled: Instant::now(),
            }),
            stepped: AtomicBool::new(false),
        }
    }

    /// Configured rate in bytes per second (0 = unlimited).
    #[must_use]
    pub const fn rate(&self) -> u64 {
        self.rate
    }

    /// Whether limiting is active.
    #[must_use]
    pub const fn is_limited(&self) -> bool {
        self.rate > 0
    }

    #[allow(clippy::cast_precision_loss)]
    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.refilled).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate as f64).min(self.burst as f64);
        bucket.refilled = now;
    }

    /// Whole tokens currently available.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn available(&self) -> u64 {
        if !self.is_limited() {
            return u64::MAX;
        }
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens.floor() as u64
    }

    /// Blocks until at least one byte may pass, then grants up to `wanted`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn acquire(&self, wanted: usize) -> usize {
        if !self.is_limited() || wanted == 0 {
            return wanted;
        }
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                self.refill(&mut bucket, Instant::now());
                if bucket.tokens >= 1.0 {
                    let granted = (bucket.tokens.floor() as usize).min(wanted);
                    bucket.tokens -= granted as f64;
                    return granted;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate as f64)
            };
            thread::sleep(wait);
        }
    }

    /// Returns tokens acquired but not used.
    #[allow(clippy::cast_precision_loss)]
    pub fn refund(&self, unused: usize) {
        if !self.is_limited() || unused == 0 {
            return;
        }
        let mut bucket = self.bucket.lock();
        bucket.tokens = (bucket.tokens + unused as f64).min(self.burst as f64);
    }

    /// Sets the stepped flag; a clear-to-set transition restarts the refill
    /// clock.
    pub fn set_stepped(&self, stepped: bool) {
        let was = self.stepped.swap(stepped, Ordering::SeqCst);
        if stepped && !was {
            self.bucket.lock().refilled = Instant::now();
        }
    }

    /// Current stepped flag.
    #[must_use]
    pub fn is_stepped(&self) -> bool {
        self.stepped.load(Ordering::SeqCst)
    }
}

// ============================================
// Throttled Connection
// ============================================

/// A connection whose halves draw from a shared [`Throttle`].
#[derive(Debug)]
pub struct Throttled<C> {
    inner: C,
    throttle: Arc<Throttle>,
}

impl<C: Connection> Throttled<C> {
    /// Wraps `inner`.
    pub fn new(inner: C, throttle: Throttle) -> Self {
        Self {
            inner,
            throttle: Arc::new(throttle),
        }
    }

    /// The wrapped connection.
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// The shared throttle.
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }
}

impl<C: Connection> Connection for Throttled<C> {
    type Reader = ThrottledReader<C::Reader>;
    type Writer = ThrottledWriter<C::Writer>;

    fn split(&self) -> Result<(Self::Reader, Self::Writer)> {
        let (reader, writer) = self.inner.split()?;
        Ok((
            ThrottledReader {
                inner: reader,
                throttle: Arc::clone(&self.throttle),
            },
            ThrottledWriter {
                inner: writer,
                throttle: Arc::clone(&self.throttle),
            },
        ))
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout)
    }

    fn shutdown(&self) -> Result<()> {
        self.inner.shutdown()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn peer(&self) -> String {
        self.inner.peer()
    }

    fn set_stepped(&self, stepped: bool) {
        self.throttle.set_stepped(stepped);
        self.inner.set_stepped(stepped);
    }

    fn is_stepped(&self) -> bool {
        self.throttle.is_stepped()
    }
}

/// Metered receiving half.
#[derive(Debug)]
pub struct ThrottledReader<R> {
    inner: R,
    throttle: Arc<Throttle>,
}

impl<R: Read> Read for ThrottledReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let granted = self.throttle.acquire(buf.len());
        match self.inner.read(&mut buf[..granted]) {
            Ok(n) => {
                self.throttle.refund(granted - n);
                Ok(n)
            }
            Err(e) => {
                self.throttle.refund(granted);
                Err(e)
            }
        }
    }
}

/// Metered sending half.
#[derive(Debug)]
pub struct ThrottledWriter<W> {
    inner: W,
    throttle: Arc<Throttle>,
}

impl<W: Write> Write for ThrottledWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let granted = self.throttle.acquire(buf.len());
        match self.inner.write(&buf[..granted]) {
            Ok(n) => {
                self.throttle.refund(granted - n);
                Ok(n)
            }
            Err(e) => {
                self.throttle.refund(granted);
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::pipe;

    #[test]
    fn test_zero_burst_rejected() {
        assert!(matches!(
            Throttle::new(100, 0),
            Err(TransportError::InvalidConfig { .. })
        ));
        assert!(Throttle::new(0, 0).is_ok());
    }

    #[test]
    fn test_unlimited_grants_everything() {
        let throttle = Throttle::unlimited();
        assert_eq!(throttle.acquire(1 << 20), 1 << 20);
        assert_eq!(throttle.available(), u64::MAX);
    }

    #[test]
    fn test_acquire_is_capped_by_bucket() {
        let throttle = Throttle::new(10, 64).unwrap();
        assert_eq!(throttle.acquire(1000), 64);
        throttle.refund(14);
        assert_eq!(throttle.available(), 14);
    }

    #[test]
    fn test_write_is_paced() {
        let (a, b) = pipe("a", "b");
        let limited = Throttled::new(a, Throttle::new(2000, 100).unwrap());
        let (_, mut out) = limited.split().unwrap();
        let (mut input, _) = b.split().unwrap();

        let started = Instant::now();
        out.write_all(&[7u8; 500]).unwrap();
        // 100 burst + 400 at 2000 B/s
        assert!(started.elapsed() >= Duration::from_millis(150));

        let mut buf = [0u8; 500];
        input.read_exact(&mut buf).unwrap();
        assert!(buf.iter().all(|&x| x == 7));
    }

    #[test]
    fn test_stepping_restarts_refill_clock() {
        let (a, _b) = pipe("a", "b");
        let limited = Throttled::new(a, Throttle::new(1000, 1000).unwrap());
        let throttle = limited.throttle();
        assert_eq!(throttle.acquire(1000), 1000);

        limited.set_stepped(true);
        assert!(limited.is_stepped());
        limited.set_stepped(false);
        thread::sleep(Duration::from_millis(200));
        limited.set_stepped(true);
        // the idle 200ms were discarded
        assert!(throttle.available() < 50);

        // setting an already set flag does not restart the clock
        thread::sleep(Duration::from_millis(100));
        limited.set_stepped(true);
        assert!(throttle.available() >= 90);
    }
}
