//! # fplink
//!
//! Driver library for two mutually-substitutable fingerprint sensor
//! modules (one capacitive, one optical), each speaking its own binary
//! serial protocol, behind a single capability surface with enrollment
//! and search workflows on top.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use fplink::{CapacitiveSensor, EnrollOptions, MemoryStore, SensorHandle};
//!
//! #[tokio::main]
//! async fn main() -> fplink::Result<()> {
//!     let sensor = CapacitiveSensor::on_port("/dev/ttyUSB0");
//!     let handle = SensorHandle::new(sensor, Arc::new(MemoryStore::new()));
//!
//!     handle.connect().await?;
//!
//!     let outcome = handle.enroll(EnrollOptions::new("alice")).await?;
//!     println!("enrolled {} at slot {}", outcome.label, outcome.slot);
//!
//!     handle.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod capacitive;
pub mod classify;
pub mod debounce;
pub mod enroll;
pub mod error;
pub mod events;
pub mod handle;
pub mod optical;
pub mod search;
pub mod sensor;
pub mod store;

// Re-exports
pub use capacitive::CapacitiveSensor;
pub use classify::{ClassifierError, LivenessClassifier};
pub use debounce::DebounceConfig;
pub use enroll::EnrollOptions;
pub use error::{Error, Result};
pub use events::{LogEvents, NullEvents, WorkflowEvents};
pub use handle::SensorHandle;
pub use optical::OpticalSensor;
pub use search::SearchOptions;
pub use sensor::{EnrollmentMode, Sensor, SlotRange};
pub use store::{IdentityStore, MemoryStore, StoreError};

// Re-export types
pub use fplink_core::{Bitmap, DeviceStatus};
pub use fplink_transport::{SerialTransport, Transport};
pub use fplink_types::{EnrollOutcome, Liveness, SearchOutcome, TemplateRecord};
