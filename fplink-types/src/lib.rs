//! Type definitions for fplink

pub mod error;
pub mod outcome;
pub mod record;

pub use error::{Error, Result};
pub use outcome::{EnrollOutcome, Liveness, SearchOutcome};
pub use record::TemplateRecord;
