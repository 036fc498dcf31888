//! sigsweep: signature-based scanner for web shells and injected code
//!
//! This crate walks a file or directory tree, skips files whose header marks
//! them as a known binary format, and matches the rest against an ordered
//! list of byte signatures. Large files are matched chunk by chunk with a
//! carry window so patterns that straddle chunk boundaries are still found.

pub mod core;
pub mod detection;
pub mod quarantine;
pub mod scanner;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
pub use crate::core::types::*;
pub use crate::detection::{ContentScanner, SignatureSet};
pub use crate::scanner::ScanSession;
