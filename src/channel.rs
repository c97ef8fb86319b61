//! Bounded single-producer single-consumer byte channel.
//!
//! The ingest task owns the [`ByteProducer`], the frame decoder owns the
//! [`ByteConsumer`]. Bytes come out in exactly the order they went in, and a
//! write never overwrites unread data: when the channel is full the producer
//! either takes a short count or waits for [`ByteProducer::wait_for_space`].

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::{Result, TelemetryError};

#[derive(Debug)]
struct Shared {
    /// Signalled by the consumer after it frees space
    space: Notify,
    trigger_level: usize,
}

/// Constructor namespace for the producer/consumer pair.
pub struct ByteChannel;

impl ByteChannel {
    /// Create a channel holding up to `capacity` bytes.
    ///
    /// `trigger_level` is the unread byte count at which the consumer is
    /// considered released (see [`ByteConsumer::is_released`]).
    pub fn with_capacity(
        capacity: usize,
        trigger_level: usize,
    ) -> Result<(ByteProducer, ByteConsumer)> {
        if capacity == 0 {
            return Err(TelemetryError::invalid_config("channel_capacity", "must be non-zero"));
        }
        if trigger_level == 0 || trigger_level > capacity {
            return Err(TelemetryError::invalid_config(
                "trigger_level",
                format!("{} must be in 1..={}", trigger_level, capacity),
            ));
        }

        let (producer, consumer) = HeapRb::<u8>::new(capacity).split();
        let shared = Arc::new(Shared { space: Notify::new(), trigger_level });

        Ok((
            ByteProducer { inner: producer, shared: Arc::clone(&shared) },
            ByteConsumer { inner: consumer, shared },
        ))
    }
}

/// Write half of a [`ByteChannel`].
pub struct ByteProducer {
    inner: HeapProducer<u8>,
    shared: Arc<Shared>,
}

impl ByteProducer {
    /// Append as many bytes as fit, returning how many were taken.
    ///
    /// Never blocks. The accepted bytes are always a prefix of `bytes`.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        self.inner.push_slice(bytes)
    }

    /// Append every byte, waiting for the consumer to free space as needed.
    pub async fn push_all(&mut self, bytes: &[u8]) -> usize {
        let mut written = 0;
        self.push_all_from(bytes, &mut written).await;
        written
    }

    /// Append `bytes[*written..]`, advancing `written` as bytes are accepted.
    ///
    /// Cancel-safe: if the future is dropped, `written` counts exactly the
    /// bytes that made it into the channel, in order.
    pub async fn push_all_from(&mut self, bytes: &[u8], written: &mut usize) {
        loop {
            *written += self.push(&bytes[*written..]);
            if *written >= bytes.len() {
                return;
            }
            self.wait_for_space().await;
        }
    }

    /// Wait until at least one byte of space is free.
    ///
    /// Returns immediately if the channel is not full. Wakeups issued by the
    /// consumer between the check and the wait are not lost.
    pub async fn wait_for_space(&self) {
        while self.inner.free_len() == 0 {
            self.shared.space.notified().await;
        }
    }

    /// Unread bytes currently in the channel.
    pub fn available(&self) -> usize {
        self.inner.len()
    }

    /// Free space in bytes.
    pub fn free(&self) -> usize {
        self.inner.free_len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Whether enough bytes are buffered to release the consumer.
    pub fn is_released(&self) -> bool {
        self.inner.len() >= self.shared.trigger_level
    }
}

impl fmt::Debug for ByteProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteProducer")
            .field("available", &self.available())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Read half of a [`ByteChannel`].
pub struct ByteConsumer {
    inner: HeapConsumer<u8>,
    shared: Arc<Shared>,
}

impl ByteConsumer {
    /// Unread bytes currently in the channel.
    pub fn available(&self) -> usize {
        self.inner.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Whether the unread byte count has reached the trigger level.
    pub fn is_released(&self) -> bool {
        self.inner.len() >= self.shared.trigger_level
    }

    /// Remove up to `max` bytes.
    pub fn pop(&mut self, max: usize) -> Vec<u8> {
        let mut out = vec![0u8; max.min(self.inner.len())];
        let n = self.inner.pop_slice(&mut out);
        out.truncate(n);
        self.freed(n);
        out
    }

    /// Fill `buf` completely, or leave the channel untouched and return false.
    pub fn pop_exact(&mut self, buf: &mut [u8]) -> bool {
        if self.inner.len() < buf.len() {
            return false;
        }
        let n = self.inner.pop_slice(buf);
        debug_assert_eq!(n, buf.len());
        self.freed(n);
        true
    }

    fn freed(&self, n: usize) {
        if n > 0 {
            // single waiter; a stored permit covers a producer that has not parked yet
            self.shared.space.notify_one();
        }
    }
}

impl fmt::Debug for ByteConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteConsumer")
            .field("available", &self.available())
            .field("trigger_level", &self.shared.trigger_level)
            .finish()
    }
}
