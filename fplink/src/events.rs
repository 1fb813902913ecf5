//! Workflow progress callbacks
//!
//! The embedding UI layer consumes these; the terminal outcome travels
//! through the workflow's return value, not a callback.

use fplink_core::Bitmap;
use tracing::{debug, info};

/// Callbacks a workflow emits while running
pub trait WorkflowEvents: Send + Sync {
    /// Free-text status update, suitable for direct display
    fn progress(&self, _message: &str) {}

    /// A sample raster is ready (zero-based sample index)
    fn sample_ready(&self, _sample: u8, _image: &Bitmap) {}
}

/// No-op sink for headless use
pub struct NullEvents;

impl WorkflowEvents for NullEvents {}

/// Forwards progress to the tracing subscriber
pub struct LogEvents;

impl WorkflowEvents for LogEvents {
    fn progress(&self, message: &str) {
        info!("{message}");
    }

    fn sample_ready(&self, sample: u8, image: &Bitmap) {
        debug!(
            sample,
            width = image.width(),
            height = image.height(),
            "sample image ready"
        );
    }
}
