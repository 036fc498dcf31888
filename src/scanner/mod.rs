//! File system scanning.
//!
//! - Candidate discovery (directory traversal, extension allow-list)
//! - Binary format detection via magic bytes
//! - Scan sessions that tie discovery and matching together

pub mod file;
pub mod filetype;
pub mod walker;

pub use file::ScanSession;
pub use filetype::{BinaryClassifier, BinaryFormatMarker, BINARY_FORMATS, HEADER_LEN};
pub use walker::{WalkOptions, Walker};
