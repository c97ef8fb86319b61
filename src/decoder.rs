//! Frame decoder: drains the byte channel in bounded steps.
//!
//! Each step pops whole 18-byte candidates off the channel, validates them and
//! hands accepted readings to the [`Projector`]. A rejected candidate costs
//! exactly one frame's worth of bytes; the decoder does not hunt forward for
//! the next header, so a link that slips alignment keeps failing until the
//! stream realigns on its own.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::channel::ByteConsumer;
use crate::projector::{ApplyOutcome, Projector};
use crate::scheduler::PeriodicCallback;
use crate::types::{FRAME_SIZE, ProtocolFrame};

/// What one decoder step did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Candidate frames popped from the channel
    pub examined: usize,
    /// Frames that passed validation
    pub accepted: usize,
    /// Frames dropped for a bad header, address or length
    pub framing_discards: usize,
    /// Frames dropped for a checksum mismatch
    pub checksum_discards: usize,
    /// Accepted frames the projector skipped under lock contention
    pub contention_skips: usize,
    /// Channel notifications emitted by the projector
    pub notifications: usize,
    /// Bytes left in the channel after the step
    pub remaining: usize,
}

/// Cumulative decoder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub steps: u64,
    pub frames_examined: u64,
    pub frames_accepted: u64,
    pub framing_discards: u64,
    pub checksum_discards: u64,
    pub contention_skips: u64,
    pub notifications: u64,
    /// Bytes left in the channel after the latest step
    pub buffered: usize,
}

impl DecoderStats {
    fn record(&mut self, report: &StepReport) {
        self.steps += 1;
        self.frames_examined += report.examined as u64;
        self.frames_accepted += report.accepted as u64;
        self.framing_discards += report.framing_discards as u64;
        self.checksum_discards += report.checksum_discards as u64;
        self.contention_skips += report.contention_skips as u64;
        self.notifications += report.notifications as u64;
        self.buffered = report.remaining;
    }

    /// Frames rejected for any reason.
    pub fn discards(&self) -> u64 {
        self.framing_discards + self.checksum_discards
    }
}

/// Consumer side of the pipeline.
pub struct FrameDecoder {
    consumer: ByteConsumer,
    projector: Arc<Projector>,
    max_frames_per_step: usize,
    stats: DecoderStats,
    stats_tx: watch::Sender<DecoderStats>,
}

impl FrameDecoder {
    pub fn new(
        consumer: ByteConsumer,
        projector: Arc<Projector>,
        max_frames_per_step: usize,
    ) -> Self {
        let (stats_tx, _) = watch::channel(DecoderStats::default());
        Self {
            consumer,
            projector,
            max_frames_per_step: max_frames_per_step.max(1),
            stats: DecoderStats::default(),
            stats_tx,
        }
    }

    /// Examine at most `max_frames_per_step` candidate frames.
    pub async fn step(&mut self) -> StepReport {
        let mut report = StepReport::default();
        let mut raw = [0u8; FRAME_SIZE];

        while report.examined < self.max_frames_per_step {
            if !self.consumer.pop_exact(&mut raw) {
                break;
            }
            report.examined += 1;

            let frame = match ProtocolFrame::decode(&raw) {
                Ok(frame) => frame,
                Err(e) => {
                    if e.is_framing() {
                        report.framing_discards += 1;
                    } else {
                        report.checksum_discards += 1;
                    }
                    debug!("Discarded frame: {}", e);
                    continue;
                }
            };

            report.accepted += 1;
            trace!(
                status = frame.status.value(),
                any_fault = frame.status.any_fault(),
                function = frame.function,
                values = ?frame.values,
                "Frame accepted"
            );

            match self.projector.apply(&frame.into_reading()).await {
                ApplyOutcome::Applied { notifications } => report.notifications += notifications,
                ApplyOutcome::Skipped => report.contention_skips += 1,
            }
        }

        report.remaining = self.consumer.available();
        self.stats.record(&report);
        let stats = self.stats;
        self.stats_tx.send_if_modified(|current| {
            let modified = current.frames_examined != stats.frames_examined
                || current.buffered != stats.buffered;
            *current = stats;
            modified
        });

        report
    }

    /// Counters so far.
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Receiver that sees the counters after every step that did work.
    pub fn subscribe_stats(&self) -> watch::Receiver<DecoderStats> {
        self.stats_tx.subscribe()
    }

    /// Release the decoder, handing back the channel's read half.
    pub fn into_consumer(self) -> ByteConsumer {
        self.consumer
    }
}

#[async_trait::async_trait]
impl PeriodicCallback for FrameDecoder {
    async fn on_tick(&mut self) {
        let report = self.step().await;
        if report.examined > 0 {
            trace!(?report, "Decoder step");
        }
    }
}
