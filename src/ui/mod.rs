//! User interface components.
//!
//! - CLI interface
//! - Report rendering (text, JSON)

pub mod cli;
pub mod report;

pub use cli::Cli;
pub use report::{render, write_report, ReportFormat};
