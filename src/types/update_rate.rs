//! Update rate control for snapshot streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a snapshot subscriber wants to hear about changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every published snapshot (at most once per decoder tick)
    Native,

    /// At most this many snapshots per second, latest wins.
    /// Requests at or above the decoder tick rate fall back to Native.
    Max(u32),
}

impl UpdateRate {
    /// Normalize the rate against the decoder tick frequency.
    pub fn normalize(self, tick_hz: f64) -> Self {
        match self {
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if hz as f64 >= tick_hz => UpdateRate::Native,
            other => other,
        }
    }

    /// Throttle interval for this rate, if any.
    pub fn throttle_interval(self, tick_hz: f64) -> Option<Duration> {
        match self.normalize(tick_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_above_tick_rate_are_native() {
        assert_eq!(UpdateRate::Max(50).normalize(50.0), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(120).normalize(50.0), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(0).normalize(50.0), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(10).normalize(50.0), UpdateRate::Max(10));
    }

    #[test]
    fn throttle_interval_matches_rate() {
        assert_eq!(UpdateRate::Native.throttle_interval(50.0), None);
        assert_eq!(UpdateRate::Max(5).throttle_interval(50.0), Some(Duration::from_millis(200)));
    }
}
