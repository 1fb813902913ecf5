//! Capture debounce loop
//!
//! A clean capture needs a settled finger. The loop polls the presence
//! signal through a small state machine: the pad must start clear
//! (`AbsentRequired`), a press must be observed (`WaitingPress`), and
//! the capture is issued only after the signal drops again
//! (`WaitingRelease`). The firmware reports the pad clear once the
//! finger is seated well enough to image, so the falling edge, not the
//! press itself, is the capture gate.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use fplink_core::Bitmap;

use crate::error::{Error, Result};
use crate::events::WorkflowEvents;
use crate::sensor::Sensor;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    AbsentRequired,
    WaitingPress,
    WaitingRelease,
}

/// Debounce loop tuning
#[derive(Debug, Clone)]
pub struct DebounceConfig {
    /// Pause between presence polls; short enough to feel immediate,
    /// long enough not to saturate the transport
    pub poll_interval: Duration,

    /// Capture attempts before the enclosing workflow gives up
    pub attempts: u32,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            attempts: 3,
        }
    }
}

/// Acquire one clean capture, retrying up to the configured attempt
/// budget
///
/// Consecutive failures past the budget yield
/// [`Error::CaptureFailed`]; transport and protocol errors propagate
/// immediately.
pub async fn acquire<S: Sensor + ?Sized>(
    sensor: &mut S,
    events: &dyn WorkflowEvents,
    config: &DebounceConfig,
) -> Result<Bitmap> {
    for attempt in 1..=config.attempts {
        match acquire_once(sensor, events, config).await {
            Ok(Some(bitmap)) => return Ok(bitmap),
            Ok(None) => {
                warn!(attempt, "capture came back empty");
                events.progress("Capture failed, please try again");
            }
            Err(e) if matches!(e, Error::Device { .. }) => {
                warn!(attempt, error = %e, "capture rejected by device");
                events.progress("Capture failed, please try again");
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::CaptureFailed {
        attempts: config.attempts,
    })
}

/// One pass of the debounce state machine followed by a capture
async fn acquire_once<S: Sensor + ?Sized>(
    sensor: &mut S,
    events: &dyn WorkflowEvents,
    config: &DebounceConfig,
) -> Result<Option<Bitmap>> {
    let mut phase = Phase::AbsentRequired;
    let mut prompted_lift = false;

    loop {
        let present = sensor.detect_presence().await?;

        match (phase, present) {
            (Phase::AbsentRequired, true) => {
                if !prompted_lift {
                    events.progress("Remove your finger from the sensor");
                    prompted_lift = true;
                }
            }
            (Phase::AbsentRequired, false) => {
                events.progress("Place your finger on the sensor");
                phase = Phase::WaitingPress;
            }
            (Phase::WaitingPress, true) => {
                debug!("press observed, waiting for the signal to settle");
                events.progress("Press your finger firmly");
                phase = Phase::WaitingRelease;
            }
            (Phase::WaitingPress, false) => {}
            (Phase::WaitingRelease, false) => break,
            (Phase::WaitingRelease, true) => {}
        }

        sleep(config.poll_interval).await;
    }

    debug!("debounce satisfied, issuing capture");
    sensor.capture_image().await
}
