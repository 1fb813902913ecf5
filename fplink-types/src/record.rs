//! Identity records for stored templates

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Identity record for a template stored on a sensor
///
/// A record exists only once both the on-device store and the
/// persistence write have succeeded; the enrollment workflow rolls the
/// device back if the second half fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRecord {
    /// Human-readable identity label
    pub label: String,

    /// On-device template slot, unique per sensor
    pub slot: u16,

    /// When the enrollment completed
    pub enrolled_at: DateTime<Utc>,
}

impl TemplateRecord {
    /// Create a record stamped with the current time
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or whitespace-only
    /// label.
    pub fn new(label: impl Into<String>, slot: u16) -> Result<Self> {
        let label = label.into();

        if label.trim().is_empty() {
            return Err(Error::Validation("identity label must not be empty".into()));
        }

        Ok(Self {
            label,
            slot,
            enrolled_at: Utc::now(),
        })
    }
}

impl fmt::Display for TemplateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ slot {}", self.label, self.slot)
    }
}
