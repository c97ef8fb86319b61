//! Fault bitfield carried in the frame status byte

use serde::{Deserialize, Serialize};

use super::ChannelId;

/// Per-channel fault flags; bit *i* set means channel *i* reports a fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct StatusFlags(pub u8);

impl StatusFlags {
    /// Create flags from the raw status byte.
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    /// Build a status byte from one fault flag per channel, in wire order.
    pub fn from_faults(faults: [bool; ChannelId::COUNT]) -> Self {
        let bits = faults
            .iter()
            .enumerate()
            .filter(|(_, fault)| **fault)
            .fold(0u8, |acc, (bit, _)| acc | (1 << bit));
        Self(bits)
    }

    /// Check if a specific bit is set.
    pub fn is_set(&self, bit: u8) -> bool {
        bit < 8 && (self.0 & (1 << bit)) != 0
    }

    /// Fault flag for one telemetry channel.
    pub fn is_fault(&self, channel: ChannelId) -> bool {
        self.is_set(channel.index() as u8)
    }

    /// Fault flags for all channels in wire order. Bits above the channel count are ignored.
    pub fn faults(&self) -> [bool; ChannelId::COUNT] {
        ChannelId::ALL.map(|channel| self.is_fault(channel))
    }

    /// True if any channel reports a fault.
    pub fn any_fault(&self) -> bool {
        self.faults().iter().any(|fault| *fault)
    }

    /// Get the raw status byte.
    pub fn value(&self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits_map_to_channels() {
        let flags = StatusFlags::new(0b101);
        assert_eq!(flags.faults(), [true, false, true]);
        assert!(flags.is_fault(ChannelId::Buffer));
        assert!(!flags.is_fault(ChannelId::Motor1));
        assert!(flags.is_fault(ChannelId::Motor2));
        assert!(flags.any_fault());
    }

    #[test]
    fn unused_bits_do_not_raise_faults() {
        let flags = StatusFlags::new(0b1111_1000);
        assert_eq!(flags.faults(), [false, false, false]);
        assert!(!flags.any_fault());
        assert!(flags.is_set(3));
        assert!(!flags.is_set(8));
    }

    #[test]
    fn from_faults_round_trips() {
        for raw in 0u8..8 {
            let flags = StatusFlags::new(raw);
            assert_eq!(StatusFlags::from_faults(flags.faults()), flags);
        }
    }
}
