//! Core types for the telemetry link.
//!
//! - [`ProtocolFrame`] is the 18-byte wire record, decoded field by field
//! - [`StatusFlags`] is the per-channel fault bitfield from the status byte
//! - [`ChannelId`] names the three measurement channels in wire order
//! - [`TelemetryReading`] is what a validated frame hands to the projector
//! - [`DisplaySnapshot`] is the debounced per-channel display state
//! - [`UpdateRate`] controls how often snapshot subscribers are woken
//!
//! ## Usage Example
//!
//! ```rust
//! use voltwatch::types::{ChannelId, ProtocolFrame, StatusFlags};
//!
//! let bytes = ProtocolFrame::new(StatusFlags::new(0b010), 0x01, [12.0, 11.5, 0.25]).encode();
//! let reading = ProtocolFrame::decode(&bytes).unwrap().into_reading();
//!
//! assert_eq!(reading.value(ChannelId::Motor2), 0.25);
//! assert!(reading.is_fault(ChannelId::Motor1));
//! ```

mod channel;
mod frame;
mod reading;
mod snapshot;
mod status;
mod update_rate;

pub use channel::ChannelId;
pub use frame::{
    CHECKSUM_RANGE, DEVICE_ADDRESS, FRAME_HEADER, FRAME_SIZE, PAYLOAD_LENGTH, ProtocolFrame,
};
pub use reading::TelemetryReading;
pub use snapshot::{ChannelState, DisplaySnapshot, StatusColor};
pub use status::StatusFlags;
pub use update_rate::UpdateRate;
