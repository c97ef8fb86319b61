//! Replay source for captured link traffic

use std::path::Path;
use tokio::time::{Duration, Instant, sleep, sleep_until};
use tracing::{debug, info, trace};

use crate::source::ByteSource;
use crate::{Result, TelemetryError};

/// Bits on the wire per byte for 8N1 framing (start + 8 data + stop).
const BITS_PER_BYTE_8N1: f64 = 10.0;

/// Replays a raw byte capture, optionally paced at a fixed byte rate.
///
/// Unpaced replays hand out bytes as fast as they are asked for, which is what
/// tests and benches want. Paced replays reproduce the timing of a real link
/// so that channel backpressure and decoder ticks interact as they would live.
pub struct ReplaySource {
    data: Vec<u8>,
    position: usize,

    /// Bytes per second; `None` means unpaced
    byte_rate: Option<f64>,

    /// Set on the first read of a paced replay
    started: Option<Instant>,

    label: String,
}

impl ReplaySource {
    /// Load a capture file into memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data =
            std::fs::read(path).map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;

        info!("Opened capture {}: {} bytes", path.display(), data.len());

        Ok(Self {
            data,
            position: 0,
            byte_rate: None,
            started: None,
            label: format!("replay:{}", path.display()),
        })
    }

    /// Replay an in-memory capture.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let label = format!("replay:<{} bytes>", data.len());
        Self { data, position: 0, byte_rate: None, started: None, label }
    }

    /// Pace the replay at `bytes_per_second`. Non-positive rates disable pacing.
    pub fn with_byte_rate(mut self, bytes_per_second: f64) -> Self {
        self.byte_rate = (bytes_per_second > 0.0).then_some(bytes_per_second);
        debug!("Replay pacing set to {:?} B/s", self.byte_rate);
        self
    }

    /// Pace the replay as an 8N1 serial line at `baud`.
    pub fn with_baud_rate(self, baud: u32) -> Self {
        self.with_byte_rate(baud as f64 / BITS_PER_BYTE_8N1)
    }

    /// Total capture length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes handed out so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to replay.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Bytes the pacing clock allows right now, beyond those already handed out.
    fn paced_allowance(&self, started: Instant, rate: f64) -> usize {
        // epsilon keeps a byte due exactly now from flooring to the previous count
        let due = (started.elapsed().as_secs_f64() * rate + 1e-6) as usize;
        due.saturating_sub(self.position)
    }
}

#[async_trait::async_trait]
impl ByteSource for ReplaySource {
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if self.remaining() == 0 {
            // behave like an idle line
            sleep(timeout).await;
            return Ok(0);
        }

        let wanted = buf.len().min(self.remaining());
        let n = match self.byte_rate {
            None => wanted,
            Some(rate) => {
                let started = *self.started.get_or_insert_with(Instant::now);
                let mut allowed = self.paced_allowance(started, rate);
                if allowed == 0 {
                    let next_byte_at =
                        started + Duration::from_secs_f64((self.position + 1) as f64 / rate);
                    sleep_until(next_byte_at.min(Instant::now() + timeout)).await;
                    allowed = self.paced_allowance(started, rate);
                }
                wanted.min(allowed)
            }
        };

        buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;

        trace!("Replayed {} bytes ({}/{})", n, self.position, self.data.len());
        if self.remaining() == 0 {
            info!("Capture exhausted after {} bytes", self.position);
        }

        Ok(n)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }

    fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    const TIMEOUT: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn unpaced_replay_respects_buffer_size() {
        let mut source = ReplaySource::from_bytes((0u8..50).collect::<Vec<_>>());
        let mut buf = [0u8; 32];

        assert_eq!(source.read(&mut buf, TIMEOUT).await.unwrap(), 32);
        assert_eq!(buf[31], 31);
        assert_eq!(source.read(&mut buf, TIMEOUT).await.unwrap(), 18);
        assert_eq!(&buf[..18], &(32u8..50).collect::<Vec<_>>()[..]);
        assert!(source.is_exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_replay_idles_like_a_quiet_line() {
        let mut source = ReplaySource::from_bytes(vec![1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(source.read(&mut buf, TIMEOUT).await.unwrap(), 3);

        let before = Instant::now();
        assert_eq!(source.read(&mut buf, TIMEOUT).await.unwrap(), 0);
        assert!(before.elapsed() >= TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn paced_replay_does_not_outrun_its_rate() {
        let mut source = ReplaySource::from_bytes(vec![0xAB; 10_000]).with_byte_rate(1_000.0);
        let mut buf = [0u8; 1023];
        let start = Instant::now();
        let mut total = 0;

        while start.elapsed() < Duration::from_millis(500) {
            total += source.read(&mut buf, TIMEOUT).await.unwrap();
        }

        // 1000 B/s for half a second, give or take one read's worth of rounding
        assert!((490..=520).contains(&total), "replayed {} bytes", total);
    }

    #[test]
    fn baud_rate_converts_to_8n1_byte_rate() {
        let source = ReplaySource::from_bytes(Vec::new()).with_baud_rate(115_200);
        assert_eq!(source.byte_rate, Some(11_520.0));
        assert!(source.is_empty());
    }

    #[test]
    fn missing_capture_is_a_file_error() {
        let err = match ReplaySource::open("/nonexistent/capture.bin") {
            Err(e) => e,
            Ok(_) => panic!("missing file should fail"),
        };
        match err {
            TelemetryError::File { source, .. } => assert_eq!(source.kind(), ErrorKind::NotFound),
            other => panic!("unexpected error: {other}"),
        }
    }
}
