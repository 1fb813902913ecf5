//! Bulk image stream extraction for the capacitive module
//!
//! The capacitive module answers an image upload command with a single
//! fixed-size byte stream in which the pixel payload is interleaved
//! with framing overhead: a 38-byte preamble, then 129 chunks of 496
//! payload bytes each followed by 14 framing bytes, then a short
//! unframed tail. The geometry is fixed by the module firmware.

use crate::error::{Error, Result};

/// Total length of the upload stream as emitted by the module
pub const STREAM_LEN: usize = 66_218;

const PREAMBLE: usize = 38;
const CHUNK_DATA: usize = 496;
const CHUNK_OVERHEAD: usize = 14;
const FULL_CHUNKS: usize = 129;
const TAIL_ROWS: usize = 372;
const TAIL: usize = 8;

/// Bytes of the stream that extraction actually consumes
pub const CONSUMED_LEN: usize =
    PREAMBLE + FULL_CHUNKS * (CHUNK_DATA + CHUNK_OVERHEAD) + TAIL_ROWS + TAIL;

/// Pixel payload bytes produced per stream
pub const PAYLOAD_LEN: usize = FULL_CHUNKS * CHUNK_DATA + TAIL_ROWS + TAIL;

/// Extract the pixel payload from an upload stream
///
/// The result is slightly shorter than the full raster; the raster
/// decoder zero-fills the remainder.
///
/// # Errors
///
/// Returns [`Error::TooShort`] if the stream does not cover the fixed
/// chunk geometry.
pub fn extract_pixels(stream: &[u8]) -> Result<Vec<u8>> {
    if stream.len() < CONSUMED_LEN {
        return Err(Error::TooShort {
            expected: CONSUMED_LEN,
            actual: stream.len(),
        });
    }

    let mut pixels = Vec::with_capacity(PAYLOAD_LEN);
    let mut offset = PREAMBLE;

    for _ in 0..FULL_CHUNKS {
        pixels.extend_from_slice(&stream[offset..offset + CHUNK_DATA]);
        offset += CHUNK_DATA + CHUNK_OVERHEAD;
    }

    pixels.extend_from_slice(&stream[offset..offset + TAIL_ROWS]);
    offset += TAIL_ROWS;
    pixels.extend_from_slice(&stream[offset..offset + TAIL]);

    Ok(pixels)
}
