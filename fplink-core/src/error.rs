//! Error types for fplink-core

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wire-level protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Buffer is too short to hold the expected structure
    #[error("Buffer too short: expected at least {expected} bytes, got {actual} bytes")]
    TooShort {
        expected: usize,
        actual: usize,
    },

    /// Frame or packet marker bytes do not match the protocol
    #[error("Bad marker: 0x{0:04X}")]
    BadMarker(u16),

    /// Checksum verification failed; the frame is corrupt and discarded
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Unknown opcode byte in a decoded frame
    #[error("Unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// Unknown packet-type tag in a packet header
    #[error("Unknown packet type tag: 0x{0:02X}")]
    UnknownPacketType(u8),

    /// Packet length field cannot cover its own checksum
    #[error("Packet length field out of range: {0}")]
    BadPacketLength(u16),

    /// Command payload exceeds the frame's fixed capacity
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// I/O error (bitmap container output)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check whether this error means the received frame was corrupt
    /// (as opposed to structurally absent or unparseable)
    pub fn is_corrupt_frame(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }
}
