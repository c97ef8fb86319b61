//! Byte source trait for the serial read boundary

use std::time::Duration;

use crate::Result;

/// Anything that yields raw link bytes: a serial port, a capture replay, a test double.
///
/// Sources handle their own pacing. The ingest task only asks for "up to this
/// many bytes, waiting no longer than this".
#[async_trait::async_trait]
pub trait ByteSource: Send + 'static {
    /// Read up to `buf.len()` bytes, waiting at most `timeout` for the first one.
    ///
    /// Returns:
    /// - `Ok(0)` - nothing arrived within the timeout (not an error)
    /// - `Ok(n)` - `n` bytes written to the front of `buf`
    /// - `Err(e)` - device error; the caller backs off and retries
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    /// Whether the source will never produce another byte.
    ///
    /// Live devices never run dry; finite replays do.
    fn is_exhausted(&self) -> bool {
        false
    }
}

#[async_trait::async_trait]
impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read(buf, timeout).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}
