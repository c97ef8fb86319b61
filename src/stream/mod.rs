//! Snapshot streams for UI consumers

mod throttle;

pub use throttle::{Throttle, ThrottleExt};

use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::types::{DisplaySnapshot, UpdateRate};

/// Stream the snapshots published on `rx`, rate-limited per `rate`.
///
/// The current snapshot is yielded first, so a late subscriber starts from
/// the present display state rather than waiting for the next change.
pub fn snapshot_stream(
    rx: watch::Receiver<Arc<DisplaySnapshot>>,
    rate: UpdateRate,
    tick_hz: f64,
) -> BoxStream<'static, Arc<DisplaySnapshot>> {
    let snapshots = WatchStream::new(rx);
    match rate.throttle_interval(tick_hz) {
        None => snapshots.boxed(),
        Some(period) => snapshots.throttle(period).boxed(),
    }
}
