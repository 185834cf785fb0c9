//! Bandwidth throttling for inbound upload streams.
//!
//! Pacing is computed against the stream start: after each read the reader sleeps until
//! the wall clock catches up with the time the consumed bytes should have taken at the
//! configured rate. A burst of small reads is never punished individually; only the
//! average throughput is bounded.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Read granularity used by the copy loop
pub const READ_BUFFER_SIZE: usize = 32 * 1024;

pub struct RateLimitedStream<R> {
    inner: R,
    /// Bytes per second; 0 disables pacing
    rate: u64,
    started: Instant,
    consumed: u64,
    cancel: CancellationToken,
}

impl<R: AsyncRead + Unpin> RateLimitedStream<R> {
    pub fn new(inner: R, rate: u64, cancel: CancellationToken) -> Self {
        Self {
            inner,
            rate,
            started: Instant::now(),
            consumed: 0,
            cancel,
        }
    }

    /// Read into `buf`, then sleep as long as needed to stay under the rate.
    ///
    /// Fails with `ErrorKind::Interrupted` once the cancellation token fires.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(cancelled()),
            res = self.inner.read(buf) => res?,
        };

        self.consumed += n as u64;
        if n == 0 || self.rate == 0 {
            return Ok(n);
        }

        let expected = Duration::from_secs_f64(self.consumed as f64 / self.rate as f64);
        let elapsed = self.started.elapsed();

        if expected > elapsed {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(cancelled()),
                _ = tokio::time::sleep(expected - elapsed) => {}
            }
        }

        Ok(n)
    }

    /// Total bytes read so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn rate(&self) -> u64 {
        self.rate
    }
}

fn cancelled() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "upload cancelled")
}
