//! Token bucket throttling for byte streams.
//!
//! Tokens are bytes. They accumulate continuously at `rate` per second up to
//! `capacity`, and every write first takes as many tokens as it carries
//! bytes. There is no background timer: the balance is recomputed from the
//! elapsed time whenever tokens are requested, and a short balance suspends
//! the caller with `tokio::time::sleep`, leaving other tasks free to run.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

/// Largest single read issued by [`copy`].
pub const COPY_BUFFER_SIZE: usize = 32 * 1024;

#[derive(Debug)]
pub struct TokenBucket {
    /// `None` when unlimited.
    limits: Option<Limits>,
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    /// A bucket refilling at `rate` bytes per second. `rate <= 0` never
    /// throttles. `capacity` defaults to one second of throughput.
    ///
    /// The bucket starts empty, so a transfer of `S` bytes takes at least
    /// `S / rate` seconds from its first byte.
    pub fn new(rate: i64, capacity: Option<u64>) -> Self {
        let limits = (rate > 0).then(|| {
            let rate = rate as f64;
            let capacity = capacity.filter(|c| *c > 0).map_or(rate, |c| c as f64);
            Limits { rate, capacity }
        });

        Self {
            limits,
            tokens: 0.0,
            last_refill: Instant::now(),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0, None)
    }

    pub fn is_unlimited(&self) -> bool {
        self.limits.is_none()
    }

    /// Burst size in bytes, `None` when unlimited.
    pub fn capacity(&self) -> Option<u64> {
        self.limits.map(|l| l.capacity as u64)
    }

    fn refill(&mut self, limits: Limits, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * limits.rate).min(limits.capacity);
        self.last_refill = now;
    }

    /// Take `n` tokens if they are available right now.
    pub fn try_acquire(&mut self, n: u64) -> bool {
        let Some(limits) = self.limits else {
            return true;
        };
        self.refill(limits, Instant::now());
        if self.tokens >= n as f64 {
            self.tokens -= n as f64;
            true
        } else {
            false
        }
    }

    /// Time until `n` tokens will be available, without taking any.
    pub fn time_until(&mut self, n: u64) -> Duration {
        let Some(limits) = self.limits else {
            return Duration::ZERO;
        };
        self.refill(limits, Instant::now());
        let deficit = n as f64 - self.tokens;
        if deficit <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(deficit / limits.rate)
        }
    }

    /// Wait until `n` tokens have accumulated, then take them.
    ///
    /// Requests larger than the capacity are served in capacity-sized
    /// installments so they still complete.
    pub async fn acquire(&mut self, n: u64) {
        let Some(limits) = self.limits else {
            return;
        };

        let mut remaining = n;
        while remaining > 0 {
            let step = remaining.min(limits.capacity.max(1.0) as u64);
            loop {
                let wait = self.time_until(step);
                if wait.is_zero() {
                    break;
                }
                tokio::time::sleep(wait).await;
            }
            self.tokens -= step as f64;
            remaining -= step;
        }
    }
}

/// Copy `reader` into `writer`, throttled to `rate` bytes per second.
///
/// Bytes are only ever delayed, never dropped. The first failed write aborts
/// the copy and its error is returned; nothing is retried. Returns the number
/// of bytes written.
pub async fn copy<R, W>(
    reader: &mut R,
    writer: &mut W,
    rate: i64,
    capacity: Option<u64>,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut bucket = TokenBucket::new(rate, capacity);
    copy_with_bucket(reader, writer, &mut bucket).await
}

/// Like [`copy`], drawing from a caller-owned bucket.
pub async fn copy_with_bucket<R, W>(
    reader: &mut R,
    writer: &mut W,
    bucket: &mut TokenBucket,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let chunk = bucket
        .capacity()
        .map_or(COPY_BUFFER_SIZE, |c| (c as usize).clamp(1, COPY_BUFFER_SIZE));
    let mut buf = vec![0u8; chunk];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        bucket.acquire(n as u64).await;
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }

    writer.flush().await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity_is_one_second() {
        let bucket = TokenBucket::new(1000, None);
        assert_eq!(bucket.capacity(), Some(1000));
    }

    #[test]
    fn test_explicit_capacity() {
        let bucket = TokenBucket::new(1000, Some(64));
        assert_eq!(bucket.capacity(), Some(64));
    }

    #[test]
    fn test_non_positive_rate_is_unlimited() {
        assert!(TokenBucket::new(0, None).is_unlimited());
        assert!(TokenBucket::new(-5, Some(10)).is_unlimited());
        let mut bucket = TokenBucket::unlimited();
        assert!(bucket.try_acquire(u64::MAX));
        assert_eq!(bucket.time_until(1 << 40), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_starts_empty() {
        let mut bucket = TokenBucket::new(1000, None);
        assert!(!bucket.try_acquire(500));
        assert!(bucket.time_until(500) > Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_refill_is_capped() {
        let mut bucket = TokenBucket::new(10_000, Some(100));
        tokio::time::sleep(Duration::from_millis(50)).await;
        // 500 tokens would have accrued without the cap
        assert!(!bucket.try_acquire(101));
        assert!(bucket.try_acquire(100));
    }

    #[tokio::test]
    async fn test_acquire_waits_for_tokens() {
        let mut bucket = TokenBucket::new(10_000, None);
        let start = std::time::Instant::now();
        bucket.acquire(2_000).await;
        assert!(start.elapsed() >= Duration::from_millis(190));
    }

    #[tokio::test]
    async fn test_acquire_larger_than_capacity_completes() {
        let mut bucket = TokenBucket::new(20_000, Some(1_000));
        let start = std::time::Instant::now();
        bucket.acquire(3_000).await;
        assert!(start.elapsed() >= Duration::from_millis(140));
    }
}
