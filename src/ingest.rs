//! Byte ingest task: device reads into the byte channel.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::channel::ByteProducer;
use crate::config::{Backpressure, PipelineConfig};
use crate::scheduler::WakeHandle;
use crate::source::ByteSource;

/// Cap on the read-error backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Ingest task settings, taken from [`PipelineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    pub read_chunk: usize,
    pub read_timeout: Duration,
    pub backpressure: Backpressure,
}

impl IngestSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            read_chunk: config.read_chunk,
            read_timeout: config.read_timeout(),
            backpressure: config.backpressure,
        }
    }
}

/// Cumulative ingest counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Bytes returned by the source
    pub bytes_read: u64,
    /// Bytes accepted by the channel
    pub bytes_pushed: u64,
    /// Reads that returned nothing within the timeout
    pub empty_reads: u64,
    /// Reads that failed
    pub read_errors: u64,
    /// Pushes the channel could not take in full
    pub short_writes: u64,
    /// Early decoder wakes requested
    pub decoder_wakes: u64,
    /// The source reported it will produce nothing more
    pub source_exhausted: bool,
}

#[derive(Debug, Default)]
struct IngestCounters {
    bytes_read: AtomicU64,
    bytes_pushed: AtomicU64,
    empty_reads: AtomicU64,
    read_errors: AtomicU64,
    short_writes: AtomicU64,
    decoder_wakes: AtomicU64,
    source_exhausted: AtomicBool,
}

impl IngestCounters {
    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> IngestStats {
        IngestStats {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_pushed: self.bytes_pushed.load(Ordering::Relaxed),
            empty_reads: self.empty_reads.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            short_writes: self.short_writes.load(Ordering::Relaxed),
            decoder_wakes: self.decoder_wakes.load(Ordering::Relaxed),
            source_exhausted: self.source_exhausted.load(Ordering::Acquire),
        }
    }
}

/// Handle to a running ingest task.
pub struct IngestHandle {
    counters: Arc<IngestCounters>,
    cancel: CancellationToken,
    task: JoinHandle<ByteProducer>,
}

impl IngestHandle {
    /// Counters so far.
    pub fn stats(&self) -> IngestStats {
        self.counters.snapshot()
    }

    /// Whether the source has run dry.
    pub fn is_source_exhausted(&self) -> bool {
        self.counters.source_exhausted.load(Ordering::Acquire)
    }

    /// Cancel the task and wait for it to exit.
    ///
    /// Returns the channel's write half so the caller decides when the channel
    /// is released, plus the final counters.
    pub async fn stop(self) -> (Option<ByteProducer>, IngestStats) {
        self.cancel.cancel();
        let producer = match self.task.await {
            Ok(producer) => Some(producer),
            Err(e) => {
                error!("Ingest task failed: {}", e);
                None
            }
        };
        (producer, self.counters.snapshot())
    }
}

/// Spawns the task that moves bytes from a [`ByteSource`] into the channel.
pub struct IngestTask;

impl IngestTask {
    /// Spawn the ingest loop. It runs until `cancel` fires.
    ///
    /// `wake` is signalled whenever the channel fills up or crosses its trigger level.
    pub fn spawn<S>(
        source: S,
        producer: ByteProducer,
        wake: WakeHandle,
        settings: IngestSettings,
        cancel: CancellationToken,
    ) -> IngestHandle
    where
        S: ByteSource,
    {
        let counters = Arc::new(IngestCounters::default());
        let task_counters = Arc::clone(&counters);
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            Self::ingest_task(source, producer, wake, settings, task_counters, task_cancel).await
        });

        IngestHandle { counters, cancel, task }
    }

    async fn ingest_task<S>(
        mut source: S,
        mut producer: ByteProducer,
        wake: WakeHandle,
        settings: IngestSettings,
        counters: Arc<IngestCounters>,
        cancel: CancellationToken,
    ) -> ByteProducer
    where
        S: ByteSource,
    {
        info!(
            source = %source.describe(),
            chunk = settings.read_chunk,
            policy = ?settings.backpressure,
            "Ingest task started"
        );

        let mut buf = vec![0u8; settings.read_chunk];
        // unaccepted tail of `buf`, only ever non-empty under ShortWrite
        let mut pending: Range<usize> = 0..0;
        let mut error_count = 0u32;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if pending.is_empty() {
                let result = tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = source.read(&mut buf, settings.read_timeout) => result,
                };

                match result {
                    Ok(0) => {
                        IngestCounters::add(&counters.empty_reads, 1);
                    }
                    Ok(n) => {
                        error_count = 0;
                        IngestCounters::add(&counters.bytes_read, n);
                        trace!("Read {} bytes", n);
                        pending = 0..n;
                    }
                    Err(e) => {
                        error_count = error_count.saturating_add(1);
                        IngestCounters::add(&counters.read_errors, 1);

                        // 20ms, 40ms, 80ms, ... capped
                        let backoff =
                            (Duration::from_millis(10) * (1 << error_count.min(7))).min(MAX_BACKOFF);
                        warn!("Read error #{} (retrying in {:?}): {}", error_count, backoff, e);

                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                        continue;
                    }
                }

                if source.is_exhausted() && !counters.source_exhausted.load(Ordering::Relaxed) {
                    info!("Source {} exhausted", source.describe());
                    counters.source_exhausted.store(true, Ordering::Release);
                }
            }

            if !pending.is_empty() {
                let accepted = producer.push(&buf[pending.clone()]);
                IngestCounters::add(&counters.bytes_pushed, accepted);
                pending.start += accepted;

                if !pending.is_empty() {
                    IngestCounters::add(&counters.short_writes, 1);
                    IngestCounters::add(&counters.decoder_wakes, 1);
                    wake.wake_now();
                    debug!("Channel full, {} bytes held back", pending.len());

                    match settings.backpressure {
                        Backpressure::Block => {
                            let mut written = 0;
                            let cancelled = tokio::select! {
                                _ = cancel.cancelled() => true,
                                _ = producer.push_all_from(&buf[pending.clone()], &mut written) => false,
                            };
                            IngestCounters::add(&counters.bytes_pushed, written);
                            if cancelled {
                                break;
                            }
                            pending = 0..0;
                        }
                        Backpressure::ShortWrite => {
                            if accepted == 0 {
                                // nothing moved; give the decoder a read timeout's worth of time
                                tokio::select! {
                                    _ = cancel.cancelled() => break,
                                    _ = producer.wait_for_space() => {}
                                    _ = tokio::time::sleep(settings.read_timeout) => {}
                                }
                            }
                        }
                    }
                } else if producer.is_released() {
                    IngestCounters::add(&counters.decoder_wakes, 1);
                    wake.wake_now();
                }
            }

            tokio::task::yield_now().await;
        }

        let stats = counters.snapshot();
        info!(
            "Ingest task ended ({} bytes read, {} pushed, {} short writes, {} read errors)",
            stats.bytes_read, stats.bytes_pushed, stats.short_writes, stats.read_errors
        );
        producer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ByteChannel;
    use crate::sources::ReplaySource;
    use crate::test_utils::{ScriptStep, ScriptedSource};

    fn settings(backpressure: Backpressure) -> IngestSettings {
        IngestSettings {
            read_chunk: 100,
            read_timeout: Duration::from_millis(10),
            backpressure,
        }
    }

    async fn drain_all(policy: Backpressure) {
        let payload: Vec<u8> = (0..5_000u32).map(|i| (i % 251) as u8).collect();
        let (producer, mut consumer) = ByteChannel::with_capacity(64, 16).unwrap();
        let cancel = CancellationToken::new();
        let handle = IngestTask::spawn(
            ReplaySource::from_bytes(payload.clone()),
            producer,
            WakeHandle::new(),
            settings(policy),
            cancel.clone(),
        );

        let mut received = Vec::new();
        while received.len() < payload.len() {
            received.extend(consumer.pop(13));
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let (producer, stats) = handle.stop().await;
        assert!(producer.is_some());
        assert_eq!(received, payload);
        assert_eq!(stats.bytes_read, payload.len() as u64);
        assert_eq!(stats.bytes_pushed, payload.len() as u64);
        assert!(stats.short_writes > 0);
        assert!(stats.source_exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn block_policy_is_lossless_and_ordered() {
        drain_all(Backpressure::Block).await;
    }

    #[tokio::test(start_paused = true)]
    async fn short_write_policy_is_lossless_and_ordered() {
        drain_all(Backpressure::ShortWrite).await;
    }

    #[tokio::test(start_paused = true)]
    async fn full_channel_wakes_the_decoder() {
        let (producer, _consumer) = ByteChannel::with_capacity(32, 30).unwrap();
        let wake = WakeHandle::new();
        let handle = IngestTask::spawn(
            ReplaySource::from_bytes(vec![0u8; 64]),
            producer,
            wake.clone(),
            settings(Backpressure::ShortWrite),
            CancellationToken::new(),
        );

        tokio::time::timeout(Duration::from_millis(100), wake.woken())
            .await
            .expect("decoder wake after short write");
        tokio::time::sleep(Duration::from_millis(5)).await;

        let stats = handle.stats();
        assert_eq!(stats.bytes_pushed, 32);
        assert!(stats.short_writes >= 1);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn read_errors_are_retried() {
        let source = ScriptedSource::new(vec![
            ScriptStep::Fail,
            ScriptStep::Fail,
            ScriptStep::Data(vec![1, 2, 3]),
            ScriptStep::Quiet,
            ScriptStep::Data(vec![4, 5]),
        ]);
        let (producer, mut consumer) = ByteChannel::with_capacity(64, 8).unwrap();
        let handle = IngestTask::spawn(
            source,
            producer,
            WakeHandle::new(),
            settings(Backpressure::Block),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(consumer.pop(64), vec![1, 2, 3, 4, 5]);

        let (_, stats) = handle.stop().await;
        assert_eq!(stats.read_errors, 2);
        assert!(stats.empty_reads >= 1);
        assert!(stats.source_exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_blocked_push() {
        let (producer, mut consumer) = ByteChannel::with_capacity(20, 10).unwrap();
        let handle = IngestTask::spawn(
            ReplaySource::from_bytes(vec![0u8; 100]),
            producer,
            WakeHandle::new(),
            settings(Backpressure::Block),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.stats().bytes_pushed, 20);

        // free some space so the blocked push makes partial progress
        assert_eq!(consumer.pop(15).len(), 15);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let (producer, stats) =
            tokio::time::timeout(Duration::from_secs(1), handle.stop()).await.expect("task exits");
        let producer = producer.expect("task returns the producer");
        assert_eq!(producer.available(), 20);
        assert_eq!(stats.bytes_pushed, 35);
        assert_eq!(stats.bytes_read, 100);
    }
}
