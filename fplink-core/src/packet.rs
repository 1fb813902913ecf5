//! Optical module packet structure and image reassembly
//!
//! The optical module frames everything in variable-length packets:
//!
//! ```text
//! ┌─────────┬─────────┬──────┬─────────┬───────────┬──────────┐
//! │  Start  │ Address │ Type │ Length  │  Payload  │ Checksum │
//! │ 2 bytes │ 4 bytes │ 1 B  │ 2 bytes │ N-2 bytes │ 2 bytes  │
//! │ (EF 01) │         │      │ (BE)    │           │ (BE)     │
//! └─────────┴─────────┴──────┴─────────┴───────────┴──────────┘
//! ```
//!
//! The length field counts the payload plus the two checksum bytes.
//! Commands sent to the module carry a computed checksum; for packets
//! received from it the two trailing bytes are consumed and discarded,
//! since the verification algorithm is sensor-internal.

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::{
    checksum,
    error::{Error, Result},
};

/// Fixed start bytes of every packet
pub const START: [u8; 2] = [0xEF, 0x01];

/// Default module address
pub const DEFAULT_ADDRESS: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// Header length: start + address + type + length
pub const HEADER_LEN: usize = 9;

/// Trailing checksum length
pub const CHECKSUM_LEN: usize = 2;

/// Packet-type tag
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    /// Host-to-module instruction
    Command = 0x01,
    /// Data packet with more to follow
    Data = 0x02,
    /// Module acknowledgment
    Ack = 0x07,
    /// Final data packet of a transfer
    EndOfData = 0x08,
}

impl PacketKind {
    /// Whether this tag terminates a streaming transfer
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::EndOfData)
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Command),
            0x02 => Ok(Self::Data),
            0x07 => Ok(Self::Ack),
            0x08 => Ok(Self::EndOfData),
            other => Err(Error::UnknownPacketType(other)),
        }
    }
}

/// Parsed 9-byte packet header
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    /// Packet-type tag
    pub kind: PacketKind,

    /// Declared length: payload bytes plus the 2-byte checksum
    pub declared_len: u16,
}

impl PacketHeader {
    /// Parse a header from exactly [`HEADER_LEN`] bytes
    ///
    /// The 4-byte address is not validated; modules are addressed
    /// point-to-point on a dedicated serial line.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(Error::TooShort {
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        }

        if buf[..2] != START {
            return Err(Error::BadMarker(u16::from_be_bytes([buf[0], buf[1]])));
        }

        let kind = PacketKind::try_from(buf[6])?;
        let declared_len = BigEndian::read_u16(&buf[7..9]);

        if (declared_len as usize) < CHECKSUM_LEN {
            return Err(Error::BadPacketLength(declared_len));
        }

        Ok(Self { kind, declared_len })
    }

    /// Payload length, excluding the trailing checksum
    pub fn payload_len(&self) -> usize {
        self.declared_len as usize - CHECKSUM_LEN
    }
}

/// Build a command packet around an instruction payload
pub fn build_command(payload: &[u8]) -> BytesMut {
    let declared_len = (payload.len() + CHECKSUM_LEN) as u16;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
    buf.put_slice(&START);
    buf.put_slice(&DEFAULT_ADDRESS);
    buf.put_u8(PacketKind::Command as u8);
    buf.put_u16(declared_len);
    buf.put_slice(payload);
    buf.put_u16(checksum::packet_sum(
        PacketKind::Command as u8,
        declared_len,
        payload,
    ));

    trace!(bytes = %hex::encode(&buf), "built command packet");

    buf
}

/// Multi-packet image accumulator
///
/// An image transfer is complete when either the declared total byte
/// count is reached or a terminal packet arrives, whichever happens
/// first.
///
/// # Examples
///
/// ```
/// use fplink_core::{ImageAssembler, PacketKind};
///
/// let mut assembler = ImageAssembler::new(4);
/// assert!(!assembler.accept(PacketKind::Data, &[1, 2]));
/// assert!(assembler.accept(PacketKind::Data, &[3, 4]));
/// assert_eq!(assembler.finish().as_ref(), &[1, 2, 3, 4]);
/// ```
#[derive(Debug)]
pub struct ImageAssembler {
    total: usize,
    data: BytesMut,
    complete: bool,
}

impl ImageAssembler {
    /// Create an accumulator expecting `total` payload bytes
    pub fn new(total: usize) -> Self {
        Self {
            total,
            data: BytesMut::with_capacity(total),
            complete: false,
        }
    }

    /// Feed one packet's payload; returns true once the transfer is
    /// complete
    pub fn accept(&mut self, kind: PacketKind, payload: &[u8]) -> bool {
        if self.complete {
            return true;
        }

        self.data.extend_from_slice(payload);

        if kind.is_terminal() || self.data.len() >= self.total {
            trace!(
                received = self.data.len(),
                total = self.total,
                terminal = kind.is_terminal(),
                "image transfer complete"
            );
            self.complete = true;
        }

        self.complete
    }

    /// Bytes accumulated so far
    pub fn received(&self) -> usize {
        self.data.len()
    }

    /// Whether the transfer has terminated
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Take the accumulated payload
    pub fn finish(self) -> Bytes {
        self.data.freeze()
    }
}
