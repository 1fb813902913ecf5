//! High-level error types

use std::time::Duration;

use fplink_core::DeviceStatus;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Protocol error: {0}")]
    Core(#[from] fplink_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] fplink_transport::Error),

    #[error("Record error: {0}")]
    Types(#[from] fplink_types::Error),

    #[error("Identity store error: {0}")]
    Store(#[from] StoreError),

    /// The module replied with its no-device sentinel
    #[error("No response from sensor module")]
    NoDevice,

    /// Device rejected an operation with a non-success status
    #[error("Device returned {status} for {op}")]
    Device {
        op: &'static str,
        status: DeviceStatus,
    },

    /// Operation not part of this sensor variant's surface
    #[error("Operation not supported by this sensor: {0}")]
    NotSupported(&'static str),

    /// A reply arrived but was not the expected shape
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The debounce loop exhausted its retry budget
    #[error("Capture failed after {attempts} attempts")]
    CaptureFailed { attempts: u32 },

    /// The workflow exceeded its wall-clock budget
    #[error("Workflow timed out after {0:?}")]
    WorkflowTimeout(Duration),

    /// Another workflow already owns the sensor
    #[error("Another workflow is already running on this sensor")]
    Busy,

    /// Enrollment samples did not match each other
    #[error("Enrollment samples do not match")]
    SampleMismatch,

    /// Device and identity store state diverged
    #[error("Device and identity store diverged: {0}")]
    Consistency(String),
}

impl Error {
    /// Check whether the transport should be reopened before retrying
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_io())
    }

    /// Check whether this was a corrupt-frame failure
    pub fn is_corrupt_frame(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_corrupt_frame())
    }
}
