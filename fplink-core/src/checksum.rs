//! Checksum algorithms for both wire formats
//!
//! The capacitive module's 26-byte frames carry an additive checksum:
//! the unsigned byte sum of the first 24 frame bytes, truncated to 16
//! bits, stored little-endian in the final two bytes.
//!
//! The optical module's packets carry an additive sum of the
//! packet-type tag, the two big-endian length bytes and the payload,
//! stored big-endian after the payload. The module verifies it on
//! commands it receives; for packets the module sends, the algorithm is
//! sensor-internal and the host only consumes the two trailing bytes.

use tracing::trace;

/// Additive frame checksum (capacitive module)
///
/// Sums `body` as unsigned bytes, wrapping at 16 bits. Callers pass the
/// first 24 bytes of a frame.
pub fn frame_sum(body: &[u8]) -> u16 {
    let sum = body
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16));

    trace!(len = body.len(), sum = format!("0x{:04X}", sum), "frame checksum");

    sum
}

/// Additive packet checksum (optical module)
///
/// Covers the packet-type tag, the big-endian length field and the
/// payload bytes.
pub fn packet_sum(kind: u8, length: u16, payload: &[u8]) -> u16 {
    let [len_hi, len_lo] = length.to_be_bytes();

    let mut sum = (kind as u16)
        .wrapping_add(len_hi as u16)
        .wrapping_add(len_lo as u16);

    for &b in payload {
        sum = sum.wrapping_add(b as u16);
    }

    sum
}
