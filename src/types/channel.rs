//! Telemetry channel identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three measurement channels carried in every frame, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ChannelId {
    /// Buffer supply voltage (status bit 0)
    Buffer,
    /// First motor voltage (status bit 1)
    Motor1,
    /// Second motor voltage (status bit 2)
    Motor2,
}

impl ChannelId {
    /// Number of channels in a frame.
    pub const COUNT: usize = 3;

    /// All channels in wire order.
    pub const ALL: [ChannelId; Self::COUNT] =
        [ChannelId::Buffer, ChannelId::Motor1, ChannelId::Motor2];

    /// Position of this channel in the frame's value array and status byte.
    pub const fn index(self) -> usize {
        match self {
            ChannelId::Buffer => 0,
            ChannelId::Motor1 => 1,
            ChannelId::Motor2 => 2,
        }
    }

    /// Short label shown at the start of a display row.
    pub fn label(self) -> &'static str {
        match self {
            ChannelId::Buffer => "CH1",
            ChannelId::Motor1 => "M1",
            ChannelId::Motor2 => "M2",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
