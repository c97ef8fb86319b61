//! The telemetry pipeline context.
//!
//! A [`Pipeline`] owns everything the link needs at runtime: the byte channel,
//! the ingest task, the periodic decoder and the projector holding the display
//! state. Nothing is global; two pipelines on two ports are independent.
//!
//! All of these are created by [`Pipeline::start`] and released by
//! [`Pipeline::stop`]. Only the snapshot publisher outlives a run, so
//! subscribers keep their stream across restarts.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voltwatch::{Pipeline, PipelineConfig, ReplaySource, TracingSink};
//!
//! # #[tokio::main]
//! # async fn main() -> voltwatch::Result<()> {
//! let mut pipeline = Pipeline::new(PipelineConfig::default(), Arc::new(TracingSink))?;
//! pipeline.start(ReplaySource::open("capture.bin")?)?;
//! // ...
//! let stats = pipeline.stop().await;
//! # Ok(())
//! # }
//! ```

use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::ByteChannel;
use crate::config::PipelineConfig;
use crate::decoder::{DecoderStats, FrameDecoder};
use crate::ingest::{IngestHandle, IngestSettings, IngestStats, IngestTask};
use crate::projector::Projector;
use crate::scheduler::{PeriodicHandle, Scheduler};
use crate::sink::DisplaySink;
use crate::source::ByteSource;
use crate::stream::snapshot_stream;
use crate::types::{DisplaySnapshot, FRAME_SIZE, UpdateRate};
use crate::{Result, TelemetryError};


/// Combined ingest and decoder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ingest: IngestStats,
    pub decoder: DecoderStats,
}

impl PipelineStats {
    /// Every byte the source produced has been examined by the decoder,
    /// leaving less than one frame behind.
    fn is_drained(&self) -> bool {
        let pushed = self.ingest.bytes_pushed;
        let consumed = self.decoder.frames_examined * FRAME_SIZE as u64;
        self.ingest.source_exhausted
            && pushed == self.ingest.bytes_read
            && consumed + self.decoder.buffered as u64 == pushed
            && self.decoder.buffered < FRAME_SIZE
    }
}

/// Tasks and handles that exist only between `start` and `stop`.
struct Running {
    cancel: CancellationToken,
    ingest: IngestHandle,
    decoder: PeriodicHandle<FrameDecoder>,
    decoder_stats: watch::Receiver<DecoderStats>,
}

impl Running {
    fn stats(&self) -> PipelineStats {
        PipelineStats { ingest: self.ingest.stats(), decoder: *self.decoder_stats.borrow() }
    }
}

/// Serial telemetry pipeline: ingest → channel → decoder → projector → sink.
pub struct Pipeline {
    config: PipelineConfig,
    sink: Arc<dyn DisplaySink>,
    publisher: watch::Sender<Arc<DisplaySnapshot>>,
    running: Option<Running>,
}

impl Pipeline {
    /// Create an idle pipeline.
    pub fn new(config: PipelineConfig, sink: Arc<dyn DisplaySink>) -> Result<Self> {
        config.validate()?;
        let (publisher, _) = watch::channel(Arc::new(DisplaySnapshot::default()));
        Ok(Self { config, sink, publisher, running: None })
    }

    /// Start ingesting from `source`.
    ///
    /// Creates the byte channel and a projector with empty display state,
    /// registers the decoder with the scheduler and spawns the ingest task.
    /// Every channel is therefore notified again on its first reading after a
    /// restart. Calling `start` on a running pipeline does nothing and drops
    /// `source`. Must be called within a tokio runtime.
    pub fn start<S>(&mut self, source: S) -> Result<()>
    where
        S: ByteSource,
    {
        if self.running.is_some() {
            debug!("Pipeline already running; ignoring start({})", source.describe());
            return Ok(());
        }

        let description = source.describe();
        let (producer, consumer) =
            ByteChannel::with_capacity(self.config.channel_capacity, self.config.trigger_level)?;

        let projector = Arc::new(Projector::with_publisher(
            Arc::clone(&self.sink),
            self.config.lock_timeout(),
            self.publisher.clone(),
        ));

        let cancel = CancellationToken::new();

        let decoder =
            FrameDecoder::new(consumer, projector, self.config.max_frames_per_step);
        let decoder_stats = decoder.subscribe_stats();
        let decoder =
            Scheduler::register_periodic(self.config.decode_interval(), decoder, cancel.child_token());

        let ingest = IngestTask::spawn(
            source,
            producer,
            decoder.waker(),
            IngestSettings::from_config(&self.config),
            cancel.child_token(),
        );

        info!(
            source = %description,
            capacity = self.config.channel_capacity,
            trigger = self.config.trigger_level,
            interval_ms = self.config.decode_interval_ms,
            "Pipeline started"
        );

        self.running = Some(Running { cancel, ingest, decoder, decoder_stats });
        Ok(())
    }

    /// Stop the pipeline and return its final counters.
    ///
    /// Teardown order: decoder callback, ingest task, then the byte channel and
    /// the projector with its state lock. The last published snapshot stays
    /// readable through [`current_snapshot`](Self::current_snapshot) until the
    /// next `start`. Returns `None` if the pipeline was not running.
    pub async fn stop(&mut self) -> Option<PipelineStats> {
        let running = self.running.take()?;
        let mut stats = running.stats();

        let consumer = match running.decoder.stop().await {
            Some(decoder) => {
                stats.decoder = decoder.stats();
                Some(decoder.into_consumer())
            }
            None => None,
        };

        let (producer, ingest_stats) = running.ingest.stop().await;
        stats.ingest = ingest_stats;

        drop(producer);
        drop(consumer);
        running.cancel.cancel();

        info!(
            "Pipeline stopped ({} bytes read, {} frames accepted, {} discarded, {} skipped)",
            stats.ingest.bytes_read,
            stats.decoder.frames_accepted,
            stats.decoder.discards(),
            stats.decoder.contention_skips
        );
        Some(stats)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Live counters, or `None` when stopped.
    pub fn stats(&self) -> Option<PipelineStats> {
        self.running.as_ref().map(Running::stats)
    }

    /// Wait until a finite source has been fully decoded.
    ///
    /// Returns immediately if the pipeline is not running. Live sources never
    /// drain, so this only makes sense for replays.
    pub async fn wait_until_drained(&self, timeout: Duration) -> Result<()> {
        let poll = self.config.decode_interval();
        let drained = async {
            while let Some(stats) = self.stats() {
                if stats.is_drained() {
                    break;
                }
                tokio::time::sleep(poll).await;
            }
        };

        tokio::time::timeout(timeout, drained).await.map_err(|_| {
            warn!("Pipeline not drained after {:?}", timeout);
            TelemetryError::Timeout { duration: timeout }
        })
    }

    /// Latest published display snapshot.
    pub fn current_snapshot(&self) -> Arc<DisplaySnapshot> {
        Arc::clone(&self.publisher.borrow())
    }

    /// Stream of display snapshots, starting with the current one.
    ///
    /// Survives `stop`/`start` cycles; ends when the pipeline is dropped.
    pub fn snapshots(&self, rate: UpdateRate) -> BoxStream<'static, Arc<DisplaySnapshot>> {
        snapshot_stream(self.publisher.subscribe(), rate, self.config.tick_hz())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            debug!("Dropping running pipeline");
            running.cancel.cancel();
        }
    }
}
