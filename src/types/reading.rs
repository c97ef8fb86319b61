//! Validated telemetry sample

use super::{ChannelId, StatusFlags};

/// Values and fault flags extracted from one validated frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryReading {
    /// Channel values in wire order; may be non-finite
    pub values: [f32; ChannelId::COUNT],
    /// Fault flags
    pub status: StatusFlags,
    /// Function code from the frame, uninterpreted
    pub function: u8,
}

impl TelemetryReading {
    /// Value for one channel.
    pub fn value(&self, channel: ChannelId) -> f32 {
        self.values[channel.index()]
    }

    /// Fault flag for one channel.
    pub fn is_fault(&self, channel: ChannelId) -> bool {
        self.status.is_fault(channel)
    }
}
