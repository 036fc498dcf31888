//! Signature-based content detection.

pub mod matcher;
pub mod signature;

pub use matcher::{ContentScanner, StreamOptions};
pub use signature::{Signature, SignatureSet, SignatureSource, DEFAULT_SIGNATURES_VERSION};
