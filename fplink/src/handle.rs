//! Serialized sensor access and workflow entry points
//!
//! Neither wire protocol carries request identifiers; replies correlate
//! to requests by temporal order alone, so two operations in flight on
//! one transport silently corrupt the stream. [`SensorHandle`] owns the
//! sensor behind an async mutex and is the only way workflows reach it:
//! a workflow holds the lock for its whole run, and anything else,
//! background presence polling included, is rejected with
//! [`Error::Busy`] instead of interleaved.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

use fplink_types::{EnrollOutcome, SearchOutcome, TemplateRecord};

use crate::classify::LivenessClassifier;
use crate::enroll::{self, EnrollOptions};
use crate::error::{Error, Result};
use crate::events::{LogEvents, WorkflowEvents};
use crate::search::{self, SearchOptions};
use crate::sensor::Sensor;
use crate::store::IdentityStore;

/// Shared, serialized handle to one sensor
pub struct SensorHandle<S: Sensor> {
    sensor: Arc<Mutex<S>>,
    store: Arc<dyn IdentityStore>,
    classifier: Option<Arc<dyn LivenessClassifier>>,
    events: Arc<dyn WorkflowEvents>,
    enroll_timeout: Duration,
    search_timeout: Duration,
}

impl<S: Sensor> Clone for SensorHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sensor: Arc::clone(&self.sensor),
            store: Arc::clone(&self.store),
            classifier: self.classifier.clone(),
            events: Arc::clone(&self.events),
            enroll_timeout: self.enroll_timeout,
            search_timeout: self.search_timeout,
        }
    }
}

impl<S: Sensor> SensorHandle<S> {
    /// Wrap a sensor and its identity store
    pub fn new(sensor: S, store: Arc<dyn IdentityStore>) -> Self {
        Self {
            sensor: Arc::new(Mutex::new(sensor)),
            store,
            classifier: None,
            events: Arc::new(LogEvents),
            enroll_timeout: Duration::from_secs(30),
            search_timeout: Duration::from_secs(15),
        }
    }

    /// Attach a liveness classifier
    pub fn with_classifier(mut self, classifier: Arc<dyn LivenessClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Replace the progress callback sink
    pub fn with_events(mut self, events: Arc<dyn WorkflowEvents>) -> Self {
        self.events = events;
        self
    }

    /// Set the enrollment wall-clock budget
    pub fn with_enroll_timeout(mut self, timeout: Duration) -> Self {
        self.enroll_timeout = timeout;
        self
    }

    /// Set the search wall-clock budget
    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    /// Open the sensor's transport
    pub async fn connect(&self) -> Result<()> {
        self.lock()?.connect().await
    }

    /// Close the sensor's transport
    pub async fn disconnect(&self) -> Result<()> {
        self.lock()?.disconnect().await
    }

    /// Run an enrollment workflow
    ///
    /// Rejected with [`Error::Busy`] while any other workflow holds the
    /// sensor. On wall-clock expiry the in-progress wait is abandoned,
    /// the transport is resynchronized, and
    /// [`Error::WorkflowTimeout`] is returned, distinct from
    /// [`Error::CaptureFailed`].
    pub async fn enroll(&self, options: EnrollOptions) -> Result<EnrollOutcome> {
        let mut guard = self.lock()?;

        let result = timeout(
            self.enroll_timeout,
            enroll::run(&mut *guard, self.store.as_ref(), self.events.as_ref(), &options),
        )
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(budget = ?self.enroll_timeout, "enrollment timed out");
                self.resync(&mut guard).await;
                Err(Error::WorkflowTimeout(self.enroll_timeout))
            }
        }
    }

    /// Run a search workflow
    pub async fn search(&self, options: SearchOptions) -> Result<SearchOutcome> {
        let mut guard = self.lock()?;

        let result = timeout(
            self.search_timeout,
            search::run(
                &mut *guard,
                self.store.as_ref(),
                self.classifier.as_deref(),
                self.events.as_ref(),
                &options,
            ),
        )
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(budget = ?self.search_timeout, "search timed out");
                self.resync(&mut guard).await;
                Err(Error::WorkflowTimeout(self.search_timeout))
            }
        }
    }

    /// Poll the presence signal once
    ///
    /// Background pollers share the sensor lock with workflows, so this
    /// reports [`Error::Busy`] while one runs; treat that as "skip this
    /// tick", not a failure.
    pub async fn detect_presence(&self) -> Result<bool> {
        self.lock()?.detect_presence().await
    }

    /// Delete a template from the device, then its identity record
    ///
    /// A device failure leaves the store untouched. A store failure
    /// after the device delete is reported as a consistency error.
    pub async fn delete_enrollment(&self, slot: u16) -> Result<()> {
        let mut guard = self.lock()?;

        guard.delete_template(slot).await?;

        match self.store.remove_by_slot(slot).await {
            Ok(()) => {
                info!(slot, "enrollment deleted");
                Ok(())
            }
            Err(e) => Err(Error::Consistency(format!(
                "template {slot} deleted on device but the identity record removal failed: {e}"
            ))),
        }
    }

    /// Occupied device slots (variants with bitmap enumeration only)
    pub async fn enumerate_slots(&self) -> Result<Vec<u16>> {
        self.lock()?.enumerate_slots().await
    }

    /// Enrolled template count (variants with a count command only)
    pub async fn enrolled_count(&self) -> Result<u16> {
        self.lock()?.enrolled_count().await
    }

    /// All identity records, ordered by slot
    pub async fn enrolled(&self) -> Result<Vec<TemplateRecord>> {
        Ok(self.store.list().await?)
    }

    fn lock(&self) -> Result<tokio::sync::MutexGuard<'_, S>> {
        self.sensor.try_lock().map_err(|_| Error::Busy)
    }

    async fn resync(&self, guard: &mut tokio::sync::MutexGuard<'_, S>) {
        if let Err(e) = guard.resync().await {
            warn!(error = %e, "transport resync after timeout failed");
        }
    }
}
