//! Capacitive module frame structure and encoding/decoding

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use tracing::trace;

use crate::{
    checksum,
    error::{Error, Result},
    opcode::{DeviceStatus, Opcode},
};

/// Total frame length, commands and responses alike
pub const FRAME_LEN: usize = 26;

/// Command frame marker (wire bytes `55 AA`)
pub const COMMAND_MARKER: u16 = 0xAA55;

/// Response frame marker (wire bytes `AA 55`)
pub const RESPONSE_MARKER: u16 = 0x55AA;

/// Command payload capacity in bytes
pub const COMMAND_PAYLOAD_CAPACITY: usize = 16;

/// Response payload capacity in bytes (two bytes go to the result code)
pub const RESPONSE_PAYLOAD_CAPACITY: usize = 14;

/// Opcode byte the module emits when no sensor is attached
pub const NO_DEVICE_OPCODE: u8 = 0xFF;

/// Host address byte in the command envelope
pub const HOST_ADDRESS: u8 = 0x00;

/// Module address byte in the command envelope
pub const MODULE_ADDRESS: u8 = 0x00;

/// Number of leading bytes covered by the checksum
const CHECKSUM_RANGE: usize = 24;

/// Capacitive module command frame
///
/// # Frame Structure
///
/// ```text
/// ┌─────────┬──────┬──────┬────────┬──────┬─────────┬───────────┬──────────┐
/// │ Marker  │ SID  │ DID  │ Opcode │ Rsvd │ Length  │  Payload  │ Checksum │
/// │ 2 bytes │ 1 B  │ 1 B  │  1 B   │ 1 B  │ 2 bytes │ 16 bytes  │ 2 bytes  │
/// │ (LE)    │      │      │        │      │ (LE)    │ (0-padded)│ (LE)     │
/// └─────────┴──────┴──────┴────────┴──────┴─────────┴───────────┴──────────┘
/// ```
///
/// The length field declares only the meaningful payload bytes; the
/// payload area is always padded to its 16-byte capacity. The checksum
/// is the additive sum of the first 24 bytes and is recomputed on every
/// encode.
///
/// # Examples
///
/// ```
/// use fplink_core::{CommandFrame, Opcode};
///
/// let frame = CommandFrame::new(Opcode::FingerDetect);
/// let encoded = frame.encode();
/// assert_eq!(encoded.len(), 26);
///
/// let decoded = CommandFrame::decode(&encoded).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CommandFrame {
    /// Command opcode
    pub opcode: Opcode,

    /// Meaningful payload bytes (up to 16)
    payload: Bytes,
}

impl CommandFrame {
    /// Create a command frame with an empty payload
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            payload: Bytes::new(),
        }
    }

    /// Create a command frame with payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if the payload exceeds the
    /// 16-byte capacity.
    pub fn with_payload(opcode: Opcode, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();

        if payload.len() > COMMAND_PAYLOAD_CAPACITY {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: COMMAND_PAYLOAD_CAPACITY,
            });
        }

        Ok(Self { opcode, payload })
    }

    /// Meaningful payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Encode to the 26-byte wire form
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(FRAME_LEN);

        buf.put_u16_le(COMMAND_MARKER);
        buf.put_u8(HOST_ADDRESS);
        buf.put_u8(MODULE_ADDRESS);
        buf.put_u8(self.opcode.into());
        buf.put_u8(0); // reserved
        buf.put_u16_le(self.payload.len() as u16);
        buf.put_slice(&self.payload);
        buf.put_bytes(0, COMMAND_PAYLOAD_CAPACITY - self.payload.len());

        let cks = checksum::frame_sum(&buf[..CHECKSUM_RANGE]);
        buf.put_u16_le(cks);

        trace!(
            opcode = %self.opcode,
            bytes = %hex::encode(&buf),
            "encoded command frame"
        );

        buf
    }

    /// Decode a command frame from its wire form
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is shorter than 26 bytes, the
    /// marker or opcode is wrong, the declared length exceeds capacity,
    /// or the checksum does not match.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (opcode, declared_len, body) = decode_envelope(buf, COMMAND_MARKER)?;

        if declared_len > COMMAND_PAYLOAD_CAPACITY {
            return Err(Error::PayloadTooLarge {
                size: declared_len,
                max: COMMAND_PAYLOAD_CAPACITY,
            });
        }

        Ok(Self {
            opcode: Opcode::try_from(opcode)?,
            payload: Bytes::copy_from_slice(&body[..declared_len]),
        })
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFrame")
            .field("opcode", &self.opcode)
            .field("payload", &format!("{:02X?}", self.payload.as_ref()))
            .finish()
    }
}

/// Decode outcome for a response read
///
/// The module substitutes a reserved opcode byte when no sensor is
/// attached; that case is reported without parsing the rest of the
/// frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The reserved no-device sentinel was present
    NoDevice,

    /// A well-formed response frame
    Frame(ResponseFrame),
}

/// Capacitive module response frame
///
/// Same 26-byte envelope as [`CommandFrame`], except bytes `[8..10)`
/// carry a little-endian result code, leaving 14 bytes of payload.
#[derive(Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Echoed opcode
    pub opcode: Opcode,

    /// Raw result code
    pub code: u16,

    /// Response payload (14 bytes, zero-padded by the module)
    payload: Bytes,
}

impl ResponseFrame {
    /// Decode a response from its 26-byte wire form
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChecksumMismatch`] when the recomputed checksum
    /// disagrees with the transmitted one; such frames must be
    /// discarded.
    pub fn decode(buf: &[u8]) -> Result<Reply> {
        if buf.len() < FRAME_LEN {
            return Err(Error::TooShort {
                expected: FRAME_LEN,
                actual: buf.len(),
            });
        }

        // Sentinel check happens before any further parsing
        if buf[4] == NO_DEVICE_OPCODE {
            trace!("no-device sentinel in response");
            return Ok(Reply::NoDevice);
        }

        let (opcode, _, body) = decode_envelope(buf, RESPONSE_MARKER)?;

        let code = u16::from_le_bytes([body[0], body[1]]);
        let payload = Bytes::copy_from_slice(&body[2..2 + RESPONSE_PAYLOAD_CAPACITY]);

        Ok(Reply::Frame(Self {
            opcode: Opcode::try_from(opcode)?,
            code,
            payload,
        }))
    }

    /// Encode a response frame (device side; used by tests and
    /// simulators)
    pub fn encode(opcode: Opcode, code: u16, payload: &[u8]) -> Result<BytesMut> {
        if payload.len() > RESPONSE_PAYLOAD_CAPACITY {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: RESPONSE_PAYLOAD_CAPACITY,
            });
        }

        let mut buf = BytesMut::with_capacity(FRAME_LEN);

        buf.put_u16_le(RESPONSE_MARKER);
        buf.put_u8(0x01); // module source address
        buf.put_u8(MODULE_ADDRESS);
        buf.put_u8(opcode.into());
        buf.put_u8(0);
        buf.put_u16_le(payload.len() as u16);
        buf.put_u16_le(code);
        buf.put_slice(payload);
        buf.put_bytes(0, RESPONSE_PAYLOAD_CAPACITY - payload.len());

        let cks = checksum::frame_sum(&buf[..CHECKSUM_RANGE]);
        buf.put_u16_le(cks);

        Ok(buf)
    }

    /// Normalized result status
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus::from_frame_code(self.code)
    }

    /// Response payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// First two payload bytes as a little-endian u16
    ///
    /// Most replies that carry a value (slot, count) put it here.
    pub fn payload_u16(&self) -> u16 {
        u16::from_le_bytes([self.payload[0], self.payload[1]])
    }
}

impl fmt::Debug for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFrame")
            .field("opcode", &self.opcode)
            .field("status", &self.status())
            .field("payload", &format!("{:02X?}", self.payload.as_ref()))
            .finish()
    }
}

/// Shared envelope decode: marker, checksum, opcode byte, declared
/// length and the 16 bytes following the length field
fn decode_envelope(buf: &[u8], marker: u16) -> Result<(u8, usize, &[u8])> {
    if buf.len() < FRAME_LEN {
        return Err(Error::TooShort {
            expected: FRAME_LEN,
            actual: buf.len(),
        });
    }

    let received_marker = u16::from_le_bytes([buf[0], buf[1]]);
    if received_marker != marker {
        return Err(Error::BadMarker(received_marker));
    }

    let expected = checksum::frame_sum(&buf[..CHECKSUM_RANGE]);
    let received = u16::from_le_bytes([buf[24], buf[25]]);
    if expected != received {
        return Err(Error::ChecksumMismatch { expected, received });
    }

    let declared_len = u16::from_le_bytes([buf[6], buf[7]]) as usize;

    Ok((buf[4], declared_len, &buf[8..24]))
}
