//! Display state snapshot types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ChannelId;

/// Last observed state of a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ChannelState {
    /// Last value received
    pub value: f32,
    /// Last fault flag received
    pub fault: bool,
}

impl ChannelState {
    /// Debounce comparison.
    ///
    /// Values are compared by bit pattern so that a repeated NaN counts as unchanged,
    /// while `0.0` and `-0.0` (which render differently) count as a change.
    pub fn same_as(&self, other: &ChannelState) -> bool {
        self.value.to_bits() == other.value.to_bits() && self.fault == other.fault
    }
}

/// Colour attached to a channel update, derived from its fault flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum StatusColor {
    /// Channel healthy
    Normal,
    /// Channel reports a fault
    Fault,
}

impl StatusColor {
    /// Colour for a fault flag.
    pub fn from_fault(fault: bool) -> Self {
        if fault { StatusColor::Fault } else { StatusColor::Normal }
    }

    /// 24-bit RGB value used by the display.
    pub fn rgb(self) -> u32 {
        match self {
            StatusColor::Normal => 0x00FF00,
            StatusColor::Fault => 0xFF0000,
        }
    }
}

/// Debounced display state, one entry per channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DisplaySnapshot {
    /// Per-channel state in wire order; `None` until the channel is first observed
    pub channels: [Option<ChannelState>; ChannelId::COUNT],
    /// Time of the last change, relative to when the pipeline was started
    pub last_update: Option<Duration>,
    /// Number of changes published since the pipeline was started
    pub sequence: u64,
}

impl DisplaySnapshot {
    /// State of one channel, if it has been observed.
    pub fn channel(&self, channel: ChannelId) -> Option<ChannelState> {
        self.channels[channel.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_debounces_but_signed_zero_does_not() {
        let nan = ChannelState { value: f32::NAN, fault: false };
        assert!(nan.same_as(&nan));

        let positive = ChannelState { value: 0.0, fault: false };
        let negative = ChannelState { value: -0.0, fault: false };
        assert!(!positive.same_as(&negative));
    }

    #[test]
    fn fault_flag_change_is_a_change() {
        let healthy = ChannelState { value: 12.5, fault: false };
        let faulted = ChannelState { value: 12.5, fault: true };
        assert!(!healthy.same_as(&faulted));
    }

    #[test]
    fn status_colors() {
        assert_eq!(StatusColor::from_fault(true).rgb(), 0xFF0000);
        assert_eq!(StatusColor::from_fault(false).rgb(), 0x00FF00);
    }

    #[test]
    fn empty_snapshot_has_no_channels() {
        let snapshot = DisplaySnapshot::default();
        assert!(ChannelId::ALL.iter().all(|c| snapshot.channel(*c).is_none()));
        assert_eq!(snapshot.sequence, 0);
    }
}
