//! Time-to-first-byte instrumented reader.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, ReadBuf};

/// Wraps a response body and records when the first non-empty read lands.
///
/// `start` is supplied by the caller (the instant the GET was issued), so the
/// captured value includes request latency, not just body streaming.
#[derive(Debug)]
pub struct TtfbReader<R> {
    inner: R,
    start: Instant,
    ttfb: Option<Duration>,
}

impl<R> TtfbReader<R> {
    pub fn new(inner: R, start: Instant) -> Self {
        Self {
            inner,
            start,
            ttfb: None,
        }
    }

    /// Elapsed time to the first byte, or `None` if nothing was read.
    pub fn ttfb(&self) -> Option<Duration> {
        self.ttfb
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TtfbReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if this.ttfb.is_none() {
            if let Poll::Ready(Ok(())) = poll {
                if buf.filled().len() > before {
                    this.ttfb = Some(this.start.elapsed());
                }
            }
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_records_first_read_only() {
        let start = Instant::now();
        let (mut tx, rx) = tokio::io::duplex(64);

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            tx.write_all(b"first").await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.write_all(b"second").await.unwrap();
        });

        let mut reader = TtfbReader::new(rx, start);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        writer.await.unwrap();

        assert_eq!(out, b"firstsecond");
        let ttfb = reader.ttfb().unwrap();
        assert!(ttfb >= Duration::from_millis(30), "ttfb {:?}", ttfb);
        // second chunk arrived ~50ms later and must not move the mark
        assert!(ttfb < start.elapsed() - Duration::from_millis(25), "ttfb {:?}", ttfb);
    }

    #[tokio::test]
    async fn test_empty_stream_has_no_ttfb() {
        let mut reader = TtfbReader::new(&b""[..], Instant::now());
        let mut out = Vec::new();
        let n = reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(n, 0);
        assert!(reader.ttfb().is_none());
    }
}
