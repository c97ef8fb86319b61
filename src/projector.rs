//! Debounced state projector.
//!
//! Folds validated readings into the [`DisplaySnapshot`] and tells the
//! [`DisplaySink`] only about channels whose value or fault flag actually
//! changed. The snapshot lock is always taken with a timeout; if it cannot be
//! had in time the reading is dropped and the next one will catch the display
//! up, since every reading carries all three channels.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, timeout};
use tracing::{debug, trace};

use crate::sink::DisplaySink;
use crate::types::{ChannelId, ChannelState, DisplaySnapshot, StatusColor, TelemetryReading};

/// Text shown for a value that is NaN or infinite.
pub const NOT_AVAILABLE: &str = "N/A";

/// Display text for a channel value.
pub fn format_value(value: f32) -> String {
    if value.is_finite() { format!("{:.2}", value) } else { NOT_AVAILABLE.to_string() }
}

/// What [`Projector::apply`] did with a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Reading folded into the snapshot; `notifications` channels changed
    Applied { notifications: usize },
    /// State lock not acquired within the timeout; reading dropped
    Skipped,
}

/// Owner of the display snapshot.
pub struct Projector {
    state: Mutex<DisplaySnapshot>,
    sink: Arc<dyn DisplaySink>,
    lock_timeout: Duration,
    epoch: Instant,
    publisher: watch::Sender<Arc<DisplaySnapshot>>,
}

impl Projector {
    pub fn new(sink: Arc<dyn DisplaySink>, lock_timeout: Duration) -> Self {
        let (publisher, _) = watch::channel(Arc::new(DisplaySnapshot::default()));
        Self::with_publisher(sink, lock_timeout, publisher)
    }

    /// Projector with empty display state that publishes through an existing
    /// sender, so subscribers outlive it.
    ///
    /// Subscribers are handed the empty snapshot if they held anything else.
    pub fn with_publisher(
        sink: Arc<dyn DisplaySink>,
        lock_timeout: Duration,
        publisher: watch::Sender<Arc<DisplaySnapshot>>,
    ) -> Self {
        publisher.send_if_modified(|current| {
            let stale = **current != DisplaySnapshot::default();
            if stale {
                *current = Arc::new(DisplaySnapshot::default());
            }
            stale
        });
        Self {
            state: Mutex::new(DisplaySnapshot::default()),
            sink,
            lock_timeout,
            epoch: Instant::now(),
            publisher,
        }
    }

    /// Fold one reading into the snapshot.
    ///
    /// Each channel is compared on its own; a channel seen for the first time
    /// always notifies. When at least one channel changed the snapshot's
    /// sequence and timestamp advance and it is republished; otherwise the
    /// snapshot is left untouched.
    pub async fn apply(&self, reading: &TelemetryReading) -> ApplyOutcome {
        let Ok(mut state) = timeout(self.lock_timeout, self.state.lock()).await else {
            debug!("State lock busy for {:?}, skipping reading", self.lock_timeout);
            return ApplyOutcome::Skipped;
        };

        let mut notifications = 0;
        for channel in ChannelId::ALL {
            let observed =
                ChannelState { value: reading.value(channel), fault: reading.is_fault(channel) };
            let changed = state.channel(channel).is_none_or(|previous| !previous.same_as(&observed));
            if !changed {
                continue;
            }

            let text = format_value(observed.value);
            trace!(%channel, %text, fault = observed.fault, "Channel changed");
            self.sink.notify_channel_update(channel, &text, StatusColor::from_fault(observed.fault));
            state.channels[channel.index()] = Some(observed);
            notifications += 1;
        }

        if notifications > 0 {
            state.last_update = Some(self.epoch.elapsed());
            state.sequence += 1;
            self.publisher.send_replace(Arc::new(state.clone()));
        }

        ApplyOutcome::Applied { notifications }
    }

    /// Latest published snapshot.
    pub fn current(&self) -> Arc<DisplaySnapshot> {
        Arc::clone(&self.publisher.borrow())
    }
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("lock_timeout", &self.lock_timeout)
            .field("subscribers", &self.publisher.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Notification, RecordingSink};
    use crate::types::StatusFlags;

    fn reading(values: [f32; 3], status: u8) -> TelemetryReading {
        TelemetryReading { values, status: StatusFlags::new(status), function: 1 }
    }

    fn projector() -> (Projector, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (Projector::new(sink.clone(), Duration::from_millis(10)), sink)
    }

    #[test]
    fn value_formatting() {
        assert_eq!(format_value(1.234), "1.23");
        assert_eq!(format_value(12.0), "12.00");
        assert_eq!(format_value(f32::NAN), "N/A");
        assert_eq!(format_value(f32::NEG_INFINITY), "N/A");
    }

    #[tokio::test]
    async fn first_reading_notifies_every_channel() {
        let (projector, sink) = projector();
        let outcome = projector.apply(&reading([1.23, 4.56, 7.89], 0b101)).await;

        assert_eq!(outcome, ApplyOutcome::Applied { notifications: 3 });
        assert_eq!(
            sink.notifications(),
            vec![
                Notification::new(ChannelId::Buffer, "1.23", StatusColor::Fault),
                Notification::new(ChannelId::Motor1, "4.56", StatusColor::Normal),
                Notification::new(ChannelId::Motor2, "7.89", StatusColor::Fault),
            ]
        );

        let snapshot = projector.current();
        assert_eq!(snapshot.sequence, 1);
        assert!(snapshot.channel(ChannelId::Buffer).is_some_and(|c| c.fault));
    }

    #[tokio::test]
    async fn repeated_reading_is_debounced() {
        let (projector, sink) = projector();
        let r = reading([1.0, 2.0, 3.0], 0);
        for _ in 0..10 {
            projector.apply(&r).await;
        }
        assert_eq!(sink.count(), 3);
        assert_eq!(projector.current().sequence, 1);
    }

    #[tokio::test]
    async fn only_changed_channels_notify() {
        let (projector, sink) = projector();
        projector.apply(&reading([1.0, 2.0, 3.0], 0)).await;
        sink.clear();

        let outcome = projector.apply(&reading([1.0, 2.5, 3.0], 0b100)).await;
        assert_eq!(outcome, ApplyOutcome::Applied { notifications: 2 });
        assert_eq!(
            sink.notifications(),
            vec![
                Notification::new(ChannelId::Motor1, "2.50", StatusColor::Normal),
                Notification::new(ChannelId::Motor2, "3.00", StatusColor::Fault),
            ]
        );
    }

    #[tokio::test]
    async fn nan_payload_renders_na_and_debounces() {
        let (projector, sink) = projector();
        projector.apply(&reading([f32::NAN, 0.0, 0.0], 0)).await;
        projector.apply(&reading([f32::NAN, 0.0, 0.0], 0)).await;

        let notes = sink.notifications();
        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].text, "N/A");
    }

    #[tokio::test(start_paused = true)]
    async fn contended_lock_skips_the_reading() {
        let (projector, sink) = projector();
        let guard = projector.state.lock().await;

        let outcome = projector.apply(&reading([1.0, 2.0, 3.0], 0)).await;
        assert_eq!(outcome, ApplyOutcome::Skipped);
        assert_eq!(sink.count(), 0);
        drop(guard);

        let outcome = projector.apply(&reading([1.0, 2.0, 3.0], 0)).await;
        assert_eq!(outcome, ApplyOutcome::Applied { notifications: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_reading_leaves_the_snapshot_alone() {
        let (projector, _sink) = projector();
        let r = reading([1.0, 2.0, 3.0], 0);

        projector.apply(&r).await;
        let first = projector.current();
        assert_eq!(first.last_update, Some(Duration::ZERO));

        tokio::time::advance(Duration::from_secs(5)).await;
        projector.apply(&r).await;
        assert_eq!(*projector.current(), *first);
        assert_eq!(*projector.state.lock().await, *first);

        projector.apply(&reading([1.0, 2.0, 3.5], 0)).await;
        let changed = projector.current();
        assert_eq!(changed.last_update, Some(Duration::from_secs(5)));
        assert_eq!(changed.sequence, 2);
    }

    #[tokio::test]
    async fn fresh_projector_clears_shared_subscribers() {
        let (publisher, mut rx) = watch::channel(Arc::new(DisplaySnapshot::default()));
        let sink = Arc::new(RecordingSink::default());
        let lock_timeout = Duration::from_millis(10);

        let first = Projector::with_publisher(sink.clone(), lock_timeout, publisher.clone());
        first.apply(&reading([1.0, 2.0, 3.0], 0)).await;
        assert_eq!(rx.borrow_and_update().sequence, 1);
        drop(first);

        let second = Projector::with_publisher(sink.clone(), lock_timeout, publisher);
        assert!(rx.has_changed().unwrap());
        assert_eq!(**rx.borrow_and_update(), DisplaySnapshot::default());

        second.apply(&reading([1.0, 2.0, 3.0], 0)).await;
        assert_eq!(sink.count(), 6);
    }

    #[tokio::test]
    async fn subscribers_see_changes_only() {
        let (publisher, mut rx) = watch::channel(Arc::new(DisplaySnapshot::default()));
        let sink = Arc::new(RecordingSink::default());
        let projector = Projector::with_publisher(sink, Duration::from_millis(10), publisher);

        projector.apply(&reading([1.0, 2.0, 3.0], 0)).await;
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        projector.apply(&reading([1.0, 2.0, 3.0], 0)).await;
        assert!(!rx.has_changed().unwrap());
    }
}
