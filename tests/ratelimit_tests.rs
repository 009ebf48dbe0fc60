use std::time::{Duration, Instant};

use oss_gateway::ratelimit::{self, TokenBucket};
use tokio::io::{AsyncReadExt, AsyncWrite};

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_copy_is_byte_identical() {
    let data = payload(100_000);
    let mut reader = data.as_slice();
    let mut out = Vec::new();

    let copied = ratelimit::copy(&mut reader, &mut out, 0, None).await.unwrap();
    assert_eq!(copied, data.len() as u64);
    assert_eq!(out, data);
}

#[tokio::test]
async fn test_copy_respects_rate() {
    let data = payload(6_000);
    let mut reader = data.as_slice();
    let mut out = Vec::new();

    let start = Instant::now();
    ratelimit::copy(&mut reader, &mut out, 20_000, None).await.unwrap();
    // 6000 bytes at 20000 B/s
    assert!(start.elapsed() >= Duration::from_millis(290));
    assert_eq!(out, data);
}

#[tokio::test]
async fn test_copy_with_small_capacity() {
    let data = payload(4_000);
    let mut reader = data.as_slice();
    let mut out = Vec::new();

    let start = Instant::now();
    let copied = ratelimit::copy(&mut reader, &mut out, 20_000, Some(512))
        .await
        .unwrap();
    assert_eq!(copied, 4_000);
    assert!(start.elapsed() >= Duration::from_millis(190));
    assert_eq!(out, data);
}

#[tokio::test]
async fn test_unlimited_copy_does_not_wait() {
    let data = payload(5 * 1024 * 1024);
    let mut reader = data.as_slice();
    let mut out = Vec::new();

    let start = Instant::now();
    ratelimit::copy(&mut reader, &mut out, -1, None).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(out.len(), data.len());
}

#[tokio::test]
async fn test_shared_bucket_throttles_across_copies() {
    let mut bucket = TokenBucket::new(20_000, None);
    let data = payload(2_000);

    let start = Instant::now();
    for _ in 0..2 {
        let mut reader = data.as_slice();
        let mut out = Vec::new();
        ratelimit::copy_with_bucket(&mut reader, &mut out, &mut bucket)
            .await
            .unwrap();
    }
    assert!(start.elapsed() >= Duration::from_millis(190));
}

/// Accepts `budget` bytes, then fails like a disconnected peer.
struct FailingWriter {
    budget: usize,
    written: usize,
}

impl AsyncWrite for FailingWriter {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        if self.written >= self.budget {
            return std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()));
        }
        let n = buf.len().min(self.budget - self.written);
        self.written += n;
        std::task::Poll::Ready(Ok(n))
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_write_error_aborts_copy() {
    let data = payload(200_000);
    let mut reader = data.as_slice();
    let mut writer = FailingWriter {
        budget: 50_000,
        written: 0,
    };

    let err = ratelimit::copy(&mut reader, &mut writer, 0, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    assert_eq!(writer.written, 50_000);
}

#[tokio::test]
async fn test_dropped_pipe_ends_copy() {
    let data = payload(1024 * 1024);
    let (mut pipe_writer, mut pipe_reader) = tokio::io::duplex(1024);

    let copy = tokio::spawn(async move {
        let mut reader = data.as_slice();
        ratelimit::copy(&mut reader, &mut pipe_writer, 0, None).await
    });

    let mut first = [0u8; 16];
    pipe_reader.read_exact(&mut first).await.unwrap();
    drop(pipe_reader);

    assert!(copy.await.unwrap().is_err());
}
