//! Protocol frame layout and explicit field-by-field codec
//!
//! Wire layout (18 bytes, floats little-endian as produced by the device):
//!
//! ```text
//! ┌────────┬─────────┬────────┬────────┬──────────┬──────────────────┬──────────┐
//! │ header │ address │ length │ status │ function │ values 3 × f32   │ checksum │
//! │ 0xF7   │ 0x10    │ 0x0C   │ bits   │ opaque   │ (12 bytes)       │ CRC-8    │
//! └────────┴─────────┴────────┴────────┴──────────┴──────────────────┴──────────┘
//!   0        1         2        3        4          5..17              17
//! ```
//!
//! The checksum covers bytes `1..17` (address through the last value).

use std::ops::Range;

use super::{ChannelId, StatusFlags, TelemetryReading};
use crate::FrameError;
use crate::crc::crc8;

/// Frame synchronisation byte.
pub const FRAME_HEADER: u8 = 0xF7;

/// Address of the transmitting device.
pub const DEVICE_ADDRESS: u8 = 0x10;

/// Value of the length field: three 32-bit floats.
pub const PAYLOAD_LENGTH: u8 = 0x0C;

/// Total size of one frame on the wire.
pub const FRAME_SIZE: usize = 18;

const HEADER_OFFSET: usize = 0;
const ADDRESS_OFFSET: usize = 1;
const LENGTH_OFFSET: usize = 2;
const STATUS_OFFSET: usize = 3;
const FUNCTION_OFFSET: usize = 4;
const VALUES_OFFSET: usize = 5;
const VALUE_WIDTH: usize = 4;
const CHECKSUM_OFFSET: usize = 17;

/// Bytes protected by the checksum.
pub const CHECKSUM_RANGE: Range<usize> = ADDRESS_OFFSET..CHECKSUM_OFFSET;

/// A structurally valid, checksum-verified telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolFrame {
    /// Fault bitfield
    pub status: StatusFlags,
    /// Opaque function code, carried through unchanged
    pub function: u8,
    /// Channel values in wire order
    pub values: [f32; ChannelId::COUNT],
}

impl ProtocolFrame {
    /// Create a frame for the given payload. Header, address and length are fixed.
    pub fn new(status: StatusFlags, function: u8, values: [f32; ChannelId::COUNT]) -> Self {
        Self { status, function, values }
    }

    /// Decode and validate one frame.
    ///
    /// Checks run in wire order: size, header, address, length, then the checksum.
    /// Each field is read at its fixed offset; nothing is reinterpreted in place.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_SIZE {
            return Err(FrameError::Truncated { expected: FRAME_SIZE, actual: bytes.len() });
        }

        let header = bytes[HEADER_OFFSET];
        if header != FRAME_HEADER {
            return Err(FrameError::BadHeader { found: header });
        }

        let address = bytes[ADDRESS_OFFSET];
        if address != DEVICE_ADDRESS {
            return Err(FrameError::BadAddress { found: address });
        }

        let length = bytes[LENGTH_OFFSET];
        if length != PAYLOAD_LENGTH {
            return Err(FrameError::BadLength { found: length });
        }

        let transmitted = bytes[CHECKSUM_OFFSET];
        let computed = crc8(&bytes[CHECKSUM_RANGE]);
        if transmitted != computed {
            return Err(FrameError::ChecksumMismatch { transmitted, computed });
        }

        let mut values = [0.0f32; ChannelId::COUNT];
        for (index, value) in values.iter_mut().enumerate() {
            let start = VALUES_OFFSET + index * VALUE_WIDTH;
            *value = read_f32_le(&bytes[start..start + VALUE_WIDTH]);
        }

        Ok(Self {
            status: StatusFlags::new(bytes[STATUS_OFFSET]),
            function: bytes[FUNCTION_OFFSET],
            values,
        })
    }

    /// Encode this frame in wire form, computing the checksum.
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut bytes = [0u8; FRAME_SIZE];
        bytes[HEADER_OFFSET] = FRAME_HEADER;
        bytes[ADDRESS_OFFSET] = DEVICE_ADDRESS;
        bytes[LENGTH_OFFSET] = PAYLOAD_LENGTH;
        bytes[STATUS_OFFSET] = self.status.value();
        bytes[FUNCTION_OFFSET] = self.function;
        for (index, value) in self.values.iter().enumerate() {
            let start = VALUES_OFFSET + index * VALUE_WIDTH;
            bytes[start..start + VALUE_WIDTH].copy_from_slice(&value.to_le_bytes());
        }
        bytes[CHECKSUM_OFFSET] = crc8(&bytes[CHECKSUM_RANGE]);
        bytes
    }

    /// Convert into the reading handed to the projector.
    pub fn into_reading(self) -> TelemetryReading {
        TelemetryReading { values: self.values, status: self.status, function: self.function }
    }
}

fn read_f32_le(bytes: &[u8]) -> f32 {
    let mut raw = [0u8; VALUE_WIDTH];
    raw.copy_from_slice(bytes);
    f32::from_le_bytes(raw)
}
