//! # fplink-core
//!
//! Wire-level protocol primitives for the two fingerprint sensor modules
//! supported by fplink.
//!
//! This crate provides the low-level building blocks, with no I/O:
//! - 26-byte command/response frame codec for the capacitive module
//! - Variable-length packet parsing and image reassembly for the optical
//!   module
//! - Checksum calculation for both wire formats
//! - Raster reconstruction from the modules' native pixel encodings

pub mod checksum;
pub mod chunk;
pub mod error;
pub mod frame;
pub mod opcode;
pub mod packet;
pub mod raster;

pub use error::{Error, Result};
pub use frame::{CommandFrame, Reply, ResponseFrame};
pub use opcode::{DeviceStatus, Opcode};
pub use packet::{ImageAssembler, PacketHeader, PacketKind};
pub use raster::Bitmap;

/// Capacitive module raster width in pixels
pub const CAPACITIVE_WIDTH: usize = 242;

/// Capacitive module raster height in pixels
pub const CAPACITIVE_HEIGHT: usize = 266;

/// Optical module raster width in pixels
pub const OPTICAL_WIDTH: usize = 256;

/// Optical module raster height in pixels
pub const OPTICAL_HEIGHT: usize = 288;

/// Optical image transfer size: two pixels per byte
pub const OPTICAL_IMAGE_BYTES: usize = OPTICAL_WIDTH * OPTICAL_HEIGHT / 2;

/// First usable template slot on the capacitive module
pub const MIN_SLOT: u16 = 1;

/// Last usable template slot on the capacitive module
///
/// Device-observed capacity; treat as a configuration constant rather
/// than a protocol invariant.
pub const MAX_SLOT: u16 = 3000;
