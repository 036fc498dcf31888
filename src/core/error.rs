//! Error types and result handling for sigsweep.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sigsweep operations.
#[derive(Error, Debug)]
pub enum Error {
    // ===== I/O Errors =====
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to access directory: {path}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // ===== Configuration Errors =====
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("Invalid configuration value: {field} - {message}")]
    ConfigInvalid { field: String, message: String },

    // ===== Signature Errors =====
    #[error("Failed to load signatures: {0}")]
    SignatureLoad(String),

    #[error("Invalid signature on line {line}: {reason}")]
    InvalidSignature { line: usize, reason: String },

    // ===== Scanning Errors =====
    #[error("Scan was cancelled")]
    ScanCancelled,

    // ===== Quarantine Errors =====
    #[error("Failed to quarantine file: {path}")]
    QuarantineFailed {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ===== Serialization Errors =====
    #[error("JSON serialization error")]
    JsonSerialize(#[from] serde_json::Error),

    // ===== Generic Errors =====
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a file read error.
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Create a file write error.
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a directory access (traversal) error.
    pub fn directory_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryAccess {
            path: path.into(),
            source,
        }
    }

    /// Create a quarantine error from any underlying failure.
    pub fn quarantine_failed(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::QuarantineFailed {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Check if this error is recoverable (scan can continue).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::FileRead { .. } | Error::DirectoryAccess { .. } | Error::QuarantineFailed { .. }
        )
    }

    /// Check if this error must abort the run before any scanning happens.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Signatures
        ) || matches!(self, Error::PathNotFound(_))
    }

    /// Check if this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::ScanCancelled)
    }

    /// Path the error refers to, when there is one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Error::FileRead { path, .. }
            | Error::FileWrite { path, .. }
            | Error::DirectoryAccess { path, .. }
            | Error::QuarantineFailed { path, .. }
            | Error::PathNotFound(path) => Some(path),
            _ => None,
        }
    }

    /// Get a user-friendly suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::PathNotFound(_) => Some("Check that the path exists and is accessible"),
            Error::ConfigLoad(_) | Error::ConfigInvalid { .. } => {
                Some("Check your configuration file for syntax errors or missing fields")
            }
            Error::SignatureLoad(_) => {
                Some("Check that the signatures file exists and contains one pattern per line")
            }
            Error::InvalidSignature { .. } => {
                Some("Fix the regular expression, or prefix the line with 'literal:'")
            }
            Error::DirectoryAccess { .. } | Error::FileRead { .. } => {
                Some("Try running with elevated privileges (sudo/administrator)")
            }
            Error::QuarantineFailed { .. } => {
                Some("Check that the quarantine directory is writable and has no file of the same name")
            }
            Error::ScanCancelled => Some("Scan was interrupted by user request"),
            _ => None,
        }
    }

    /// Get the error category for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::FileRead { .. }
            | Error::FileWrite { .. }
            | Error::PathNotFound(_)
            | Error::Io(_) => ErrorCategory::Io,

            Error::DirectoryAccess { .. } => ErrorCategory::Traversal,

            Error::ConfigLoad(_) | Error::ConfigSave(_) | Error::ConfigInvalid { .. } => {
                ErrorCategory::Configuration
            }

            Error::SignatureLoad(_) | Error::InvalidSignature { .. } => ErrorCategory::Signatures,

            Error::ScanCancelled => ErrorCategory::Scanning,

            Error::QuarantineFailed { .. } => ErrorCategory::Quarantine,

            Error::JsonSerialize(_) => ErrorCategory::Serialization,

            Error::Internal(_) => ErrorCategory::Other,
        }
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Io,
    Traversal,
    Configuration,
    Signatures,
    Scanning,
    Quarantine,
    Serialization,
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O"),
            Self::Traversal => write!(f, "Traversal"),
            Self::Configuration => write!(f, "Configuration"),
            Self::Signatures => write!(f, "Signatures"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Quarantine => write!(f, "Quarantine"),
            Self::Serialization => write!(f, "Serialization"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Format an error with its source chain and suggestion for terminal output.
pub fn format_error_for_user(error: &Error) -> String {
    let mut output = format!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        output.push_str(&format!("\n  caused by: {}", cause));
        source = cause.source();
    }

    if let Some(suggestion) = error.suggestion() {
        output.push_str(&format!("\n  hint: {}", suggestion));
    }

    output
}
