//! Liveness classifier collaborator
//!
//! The spoof-detection model is external; workflows hand it a captured
//! raster and attach the verdict to their outcome. Classification never
//! influences the match decision, and a classifier failure degrades to
//! "no verdict" rather than failing the search.

use async_trait::async_trait;

use fplink_core::Bitmap;
use fplink_types::Liveness;

pub type ClassifyResult = std::result::Result<Liveness, ClassifierError>;

/// Classifier failure
#[derive(Debug, thiserror::Error)]
#[error("classifier failure: {0}")]
pub struct ClassifierError(pub String);

/// Genuine-tissue vs. spoof classification of a captured image
#[async_trait]
pub trait LivenessClassifier: Send + Sync {
    /// Classify a captured raster; invoked at most once per completed
    /// capture
    async fn classify(&self, image: &Bitmap) -> ClassifyResult;
}
