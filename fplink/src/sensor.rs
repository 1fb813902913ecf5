//! Sensor capability trait
//!
//! Both sensor variants expose the same surface; coordinators depend
//! only on this trait. Operations one variant lacks default to
//! [`Error::NotSupported`] rather than being split into sub-traits, so
//! a coordinator can hold a `&mut dyn Sensor` and branch on
//! [`EnrollmentMode`] where the variants genuinely differ.

use async_trait::async_trait;
use fplink_core::Bitmap;

use crate::error::{Error, Result};

/// How a variant consolidates enrollment samples
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EnrollmentMode {
    /// Three captures merged on-device into one canonical template
    MergeThree,

    /// Two captures compared directly; a mismatch aborts enrollment
    CompareTwo,
}

impl EnrollmentMode {
    /// Number of accepted samples the mode requires
    pub fn required_samples(self) -> u8 {
        match self {
            Self::MergeThree => 3,
            Self::CompareTwo => 2,
        }
    }
}

/// Inclusive slot range
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
}

impl SlotRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Number of slots covered
    pub fn len(&self) -> u16 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, slot: u16) -> bool {
        (self.start..=self.end).contains(&slot)
    }
}

/// Capability surface shared by both sensor variants
///
/// Every operation round-trips exactly one request/reply exchange on
/// the underlying transport, so callers must serialize access; see
/// [`crate::SensorHandle`].
#[async_trait]
pub trait Sensor: Send {
    /// Open the underlying transport
    async fn connect(&mut self) -> Result<()>;

    /// Close the underlying transport
    async fn disconnect(&mut self) -> Result<()>;

    /// How this variant consolidates enrollment samples
    fn enrollment_mode(&self) -> EnrollmentMode;

    /// Valid slot range for search and enumeration
    fn slot_range(&self) -> SlotRange;

    /// Poll the module's finger presence signal
    async fn detect_presence(&mut self) -> Result<bool>;

    /// Capture and download one raw image
    ///
    /// `None` means the module reported no finger on the pad.
    async fn capture_image(&mut self) -> Result<Option<Bitmap>>;

    /// Extract features from the last capture into the buffer for
    /// `sample` (zero-based)
    async fn extract_features(&mut self, sample: u8) -> Result<()>;

    /// Merge all sample buffers into one canonical template
    /// (merge-three variants only)
    async fn merge_features(&mut self) -> Result<()> {
        Err(Error::NotSupported("merge_features"))
    }

    /// Compare the two sample buffers (compare-two variants only)
    async fn compare_features(&mut self) -> Result<bool> {
        Err(Error::NotSupported("compare_features"))
    }

    /// Query the first unoccupied slot (explicit-slot variants only)
    async fn allocate_slot(&mut self) -> Result<u16> {
        Err(Error::NotSupported("allocate_slot"))
    }

    /// Store the canonical template
    ///
    /// Explicit-slot variants require `Some(slot)`; device-assigned
    /// variants resolve the slot themselves when given `None`. Returns
    /// the slot actually used.
    async fn store_template(&mut self, slot: Option<u16>) -> Result<u16>;

    /// Search a slot range for the working template
    async fn search_template(&mut self, range: SlotRange) -> Result<Option<u16>>;

    /// Delete the template at a slot
    async fn delete_template(&mut self, slot: u16) -> Result<()>;

    /// Decode the occupancy bitmap into the set of occupied slots
    /// (variants with a bitmap enumeration command only)
    async fn enumerate_slots(&mut self) -> Result<Vec<u16>> {
        Err(Error::NotSupported("enumerate_slots"))
    }

    /// Count enrolled templates (variants with a count command only)
    async fn enrolled_count(&mut self) -> Result<u16> {
        Err(Error::NotSupported("enrolled_count"))
    }

    /// Drop any half-read reply so the next exchange starts clean
    ///
    /// Called after a workflow is aborted by its wall-clock timeout.
    async fn resync(&mut self) -> Result<()> {
        Ok(())
    }
}
