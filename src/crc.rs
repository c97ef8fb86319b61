//! CRC-8 checksum used on the telemetry link.
//!
//! Bitwise, LSB-first, initial value `0x00`, no final XOR, feedback constant `0x8C`.
//! The transmitting firmware computes exactly this, so the constant and the bit
//! order are part of the wire format.

/// Reflected feedback constant XORed in whenever the low bit shifts out set.
pub const CRC8_POLY_REFLECTED: u8 = 0x8C;

/// Accumulator value before the first byte.
pub const CRC8_INIT: u8 = 0x00;

/// Compute the link CRC-8 over `bytes`.
pub fn crc8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(CRC8_INIT, |crc, &byte| crc8_update(crc, byte))
}

/// Fold a single byte into a running CRC-8 accumulator.
pub const fn crc8_update(crc: u8, byte: u8) -> u8 {
    let mut crc = crc ^ byte;
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 0x01 != 0 { (crc >> 1) ^ CRC8_POLY_REFLECTED } else { crc >> 1 };
        bit += 1;
    }
    crc
}
