//! Search coordinator
//!
//! Single capture, feature extraction, ranged search, identity
//! resolution. A device match whose slot is missing from the identity
//! index is reported as its own outcome: the search itself succeeded,
//! but device and store have diverged.

use tracing::{debug, info, warn};

use fplink_core::Bitmap;
use fplink_types::{Liveness, SearchOutcome};

use crate::classify::LivenessClassifier;
use crate::debounce::{self, DebounceConfig};
use crate::error::Result;
use crate::events::WorkflowEvents;
use crate::sensor::Sensor;
use crate::store::IdentityStore;

/// Search parameters
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Hand the captured raster to the liveness classifier after the
    /// match decision
    pub liveness: bool,

    /// Debounce tuning for the capture
    pub debounce: DebounceConfig,
}

impl SearchOptions {
    /// Enable liveness classification
    pub fn with_liveness(mut self) -> Self {
        self.liveness = true;
        self
    }
}

pub(crate) async fn run<S: Sensor + ?Sized>(
    sensor: &mut S,
    store: &dyn IdentityStore,
    classifier: Option<&dyn LivenessClassifier>,
    events: &dyn WorkflowEvents,
    options: &SearchOptions,
) -> Result<SearchOutcome> {
    info!("starting search");
    events.progress("Waiting for finger");

    let bitmap = debounce::acquire(sensor, events, &options.debounce).await?;
    events.sample_ready(0, &bitmap);

    sensor.extract_features(0).await?;

    events.progress("Searching template library");
    let range = sensor.slot_range();
    let hit = sensor.search_template(range).await?;

    // The verdict is attached to whatever the match decision already is
    let liveness = if options.liveness {
        classify(classifier, &bitmap, events).await
    } else {
        None
    };

    match hit {
        None => {
            info!("no match");
            events.progress("No matching fingerprint found");
            Ok(SearchOutcome::NoMatch { liveness })
        }
        Some(slot) => match store.get(slot).await? {
            Some(record) => {
                info!(slot, label = %record.label, "match resolved");
                events.progress(&format!("Matched {}", record.label));
                Ok(SearchOutcome::Match {
                    slot,
                    label: record.label,
                    liveness,
                })
            }
            None => {
                warn!(slot, "device matched a slot absent from the identity index");
                events.progress("Match found, but no identity is on record for it");
                Ok(SearchOutcome::UnresolvedMatch { slot, liveness })
            }
        },
    }
}

async fn classify(
    classifier: Option<&dyn LivenessClassifier>,
    bitmap: &Bitmap,
    events: &dyn WorkflowEvents,
) -> Option<Liveness> {
    let classifier = match classifier {
        Some(classifier) => classifier,
        None => {
            warn!("liveness requested but no classifier configured");
            return None;
        }
    };

    events.progress("Running liveness check");

    match classifier.classify(bitmap).await {
        Ok(verdict) => {
            debug!(?verdict, "liveness verdict");
            Some(verdict)
        }
        Err(e) => {
            warn!(error = %e, "liveness classification failed");
            None
        }
    }
}
