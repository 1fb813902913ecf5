//! Enrollment coordinator
//!
//! Sequences multi-sample capture, consolidation, on-device store and
//! the persistence write. The identity record is created only after
//! both the device store and the persistence write succeed; if the
//! write fails, a compensating device delete keeps the two sides from
//! diverging.

use tracing::{debug, info, warn};

use fplink_types::{EnrollOutcome, TemplateRecord};

use crate::debounce::{self, DebounceConfig};
use crate::error::{Error, Result};
use crate::events::WorkflowEvents;
use crate::sensor::{EnrollmentMode, Sensor};
use crate::store::IdentityStore;

/// Enrollment parameters
#[derive(Debug, Clone)]
pub struct EnrollOptions {
    /// Identity label to record for the new template
    pub label: String,

    /// Debounce tuning for each sample
    pub debounce: DebounceConfig,
}

impl EnrollOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            debounce: DebounceConfig::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    AllocateSlot,
    Sample(u8),
    Consolidate,
    Store,
    Persist(u16),
}

pub(crate) async fn run<S: Sensor + ?Sized>(
    sensor: &mut S,
    store: &dyn IdentityStore,
    events: &dyn WorkflowEvents,
    options: &EnrollOptions,
) -> Result<EnrollOutcome> {
    let mode = sensor.enrollment_mode();
    let required = mode.required_samples();

    info!(label = %options.label, ?mode, "starting enrollment");
    events.progress("Starting fingerprint enrollment");

    // Explicit-slot variants pick their target before sampling begins
    let mut target_slot = None;
    let mut state = match mode {
        EnrollmentMode::MergeThree => State::AllocateSlot,
        EnrollmentMode::CompareTwo => State::Sample(0),
    };

    loop {
        debug!(?state, "enrollment state");

        match state {
            State::AllocateSlot => {
                let slot = sensor.allocate_slot().await?;
                debug!(slot, "target slot allocated");
                target_slot = Some(slot);
                state = State::Sample(0);
            }

            State::Sample(index) if index < required => {
                events.progress(&format!("Sample {}/{}", index + 1, required));

                let bitmap = debounce::acquire(sensor, events, &options.debounce).await?;
                sensor.extract_features(index).await?;
                events.sample_ready(index, &bitmap);

                state = State::Sample(index + 1);
            }

            State::Sample(_) => state = State::Consolidate,

            State::Consolidate => {
                match mode {
                    EnrollmentMode::MergeThree => {
                        events.progress("Merging samples into one template");
                        sensor.merge_features().await?;
                    }
                    EnrollmentMode::CompareTwo => {
                        events.progress("Comparing samples");
                        if !sensor.compare_features().await? {
                            warn!("enrollment samples do not match, aborting");
                            return Err(Error::SampleMismatch);
                        }
                    }
                }
                state = State::Store;
            }

            State::Store => {
                events.progress("Storing template on the sensor");
                let slot = sensor.store_template(target_slot).await?;
                state = State::Persist(slot);
            }

            State::Persist(slot) => {
                let record = TemplateRecord::new(options.label.clone(), slot)?;

                if let Err(store_error) = store.insert(record).await {
                    warn!(slot, error = %store_error, "persistence failed, rolling back device store");
                    events.progress("Rolling back stored template");

                    if let Err(delete_error) = sensor.delete_template(slot).await {
                        warn!(slot, error = %delete_error, "compensating delete failed");
                        return Err(Error::Consistency(format!(
                            "identity write failed for slot {slot} ({store_error}) \
                             and the compensating delete also failed ({delete_error})"
                        )));
                    }

                    return Err(Error::Consistency(format!(
                        "identity write failed for slot {slot}: {store_error}"
                    )));
                }

                info!(slot, label = %options.label, "enrollment complete");
                events.progress(&format!("Enrolled {} at slot {}", options.label, slot));

                return Ok(EnrollOutcome {
                    slot,
                    label: options.label.clone(),
                });
            }
        }
    }
}
