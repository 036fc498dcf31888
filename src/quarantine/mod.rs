//! Quarantine of infected files.

pub mod operations;

pub use operations::{Quarantine, QuarantineFailure, QuarantineSummary, QuarantinedFile};
