//! Core type definitions used throughout sigsweep.

use crate::core::error::{Error, ErrorCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Path serializers that never fail: invalid UTF-8 becomes U+FFFD.
pub mod lossy_path {
    use serde::Serializer;
    use std::path::{Path, PathBuf};

    pub fn serialize<P, S>(path: &P, serializer: S) -> Result<S::Ok, S::Error>
    where
        P: AsRef<Path>,
        S: Serializer,
    {
        serializer.serialize_str(&path.as_ref().to_string_lossy())
    }

    pub fn serialize_option<S>(path: &Option<PathBuf>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match path {
            Some(path) => serializer.serialize_some(&path.to_string_lossy()),
            None => serializer.serialize_none(),
        }
    }

    pub fn serialize_seq<S>(paths: &[PathBuf], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(paths.iter().map(|path| path.to_string_lossy()))
    }
}

/// Why a candidate file was not content-scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "reason", content = "format")]
pub enum SkipReason {
    /// Header matched a known binary format (named by the marker)
    Binary(&'static str),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Binary(format) => write!(f, "binary file ({})", format),
        }
    }
}

/// Per-file outcome of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanVerdict {
    /// File was inspected but not content-scanned
    Skipped(SkipReason),
    /// No signature matched
    Clean,
    /// A signature matched; the first hit in signature order
    Infected { signature_index: usize },
}

impl ScanVerdict {
    /// Check if this verdict flags the file.
    pub fn is_infected(&self) -> bool {
        matches!(self, ScanVerdict::Infected { .. })
    }
}

/// Current status of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Scan is currently running
    Running,
    /// Scan completed
    Completed,
    /// Scan was cancelled; the report is partial
    Cancelled,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Running => write!(f, "Running"),
            ScanStatus::Completed => write!(f, "Completed"),
            ScanStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A flagged file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Path to the infected file
    #[serde(serialize_with = "lossy_path::serialize")]
    pub path: PathBuf,
    /// Index of the matching signature in the active set
    pub signature_index: usize,
    /// The matching signature as written in the signature list
    pub signature: String,
    /// SHA256 hash of the file (if it could be computed)
    pub sha256: Option<String>,
}

impl Detection {
    /// Create a new detection.
    pub fn new(path: PathBuf, signature_index: usize, signature: impl Into<String>) -> Self {
        Self {
            path,
            signature_index,
            signature: signature.into(),
            sha256: None,
        }
    }

    /// Set the SHA256 hash.
    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }
}

/// A file that was inspected and deliberately not content-scanned.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    #[serde(serialize_with = "lossy_path::serialize")]
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Kind of per-file or per-directory problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A directory could not be listed
    Traversal,
    /// A file could not be opened or read
    FileRead,
    /// Anything else that stopped a single file from being scanned
    Other,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueKind::Traversal => write!(f, "traversal"),
            IssueKind::FileRead => write!(f, "read"),
            IssueKind::Other => write!(f, "other"),
        }
    }
}

/// A target that could not be scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanIssue {
    #[serde(serialize_with = "lossy_path::serialize_option")]
    pub path: Option<PathBuf>,
    pub kind: IssueKind,
    pub message: String,
}

impl ScanIssue {
    /// Build an issue from a recoverable error.
    pub fn from_error(error: &Error) -> Self {
        let kind = match error.category() {
            ErrorCategory::Traversal => IssueKind::Traversal,
            ErrorCategory::Io => IssueKind::FileRead,
            _ => IssueKind::Other,
        };

        let mut message = error.to_string();
        if let Some(source) = std::error::Error::source(error) {
            message.push_str(&format!(": {}", source));
        }

        Self {
            path: error.path().map(Path::to_path_buf),
            kind,
            message,
        }
    }
}

/// Aggregate result of one scan session.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Unique scan identifier
    pub scan_id: String,
    /// The scanned root
    #[serde(serialize_with = "lossy_path::serialize")]
    pub target: PathBuf,
    /// When the scan started
    pub start_time: DateTime<Utc>,
    /// When the scan ended
    pub end_time: Option<DateTime<Utc>>,
    /// Final status
    pub status: ScanStatus,
    /// Files opened and inspected, binary-skipped ones included
    pub total_scanned: u64,
    /// Infected paths in detection order, without duplicates
    #[serde(serialize_with = "lossy_path::serialize_seq")]
    pub infected_files: Vec<PathBuf>,
    /// Detail for each infected path
    pub detections: Vec<Detection>,
    /// Files skipped after header inspection
    pub skipped: Vec<SkippedFile>,
    /// Files and directories that could not be scanned
    pub errors: Vec<ScanIssue>,
    #[serde(skip)]
    seen_infected: HashSet<PathBuf>,
}

impl ScanReport {
    /// Create an empty, running report for a target.
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            scan_id: uuid::Uuid::new_v4().to_string(),
            target: target.into(),
            start_time: Utc::now(),
            end_time: None,
            status: ScanStatus::Running,
            total_scanned: 0,
            infected_files: Vec::new(),
            detections: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            seen_infected: HashSet::new(),
        }
    }

    /// Count a file that reached inspection.
    pub fn record_scanned(&mut self) {
        self.total_scanned += 1;
    }

    /// Record an infected file. Returns false if the path was already flagged.
    pub fn record_detection(&mut self, detection: Detection) -> bool {
        if !self.seen_infected.insert(detection.path.clone()) {
            return false;
        }
        self.infected_files.push(detection.path.clone());
        self.detections.push(detection);
        true
    }

    /// Record a skipped file.
    pub fn record_skip(&mut self, path: PathBuf, reason: SkipReason) {
        self.skipped.push(SkippedFile { path, reason });
    }

    /// Record a recoverable error.
    pub fn record_issue(&mut self, error: &Error) {
        self.errors.push(ScanIssue::from_error(error));
    }

    /// Number of infected files.
    pub fn threats_found(&self) -> usize {
        self.infected_files.len()
    }

    /// Check whether a path has been flagged.
    pub fn is_infected(&self, path: &Path) -> bool {
        self.seen_infected.contains(path)
    }

    /// True when nothing was flagged.
    pub fn is_clean(&self) -> bool {
        self.infected_files.is_empty()
    }

    /// Calculate scan duration in milliseconds.
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }

    /// Mark the scan as completed.
    pub fn complete(&mut self) {
        self.end_time = Some(Utc::now());
        self.status = ScanStatus::Completed;
    }

    /// Mark the scan as cancelled.
    pub fn cancel(&mut self) {
        self.end_time = Some(Utc::now());
        self.status = ScanStatus::Cancelled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_deduplicated() {
        let mut report = ScanReport::new("/scan");
        let path = PathBuf::from("/scan/a.php");

        assert!(report.record_detection(Detection::new(path.clone(), 0, "eval")));
        assert!(!report.record_detection(Detection::new(path.clone(), 2, "assert")));

        assert_eq!(report.infected_files, vec![path.clone()]);
        assert_eq!(report.detections.len(), 1);
        assert_eq!(report.detections[0].signature_index, 0);
        assert!(report.is_infected(&path));
    }

    #[test]
    fn test_detection_order_preserved() {
        let mut report = ScanReport::new("/scan");
        for name in ["c.php", "a.php", "b.php"] {
            report.record_detection(Detection::new(PathBuf::from(name), 0, "x"));
        }
        let names: Vec<_> = report
            .infected_files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["c.php", "a.php", "b.php"]);
    }

    #[test]
    fn test_issue_from_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let issue = ScanIssue::from_error(&Error::file_read("/x/y.php", io));
        assert_eq!(issue.kind, IssueKind::FileRead);
        assert_eq!(issue.path, Some(PathBuf::from("/x/y.php")));
        assert!(issue.message.contains("denied"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let issue = ScanIssue::from_error(&Error::directory_access("/x", io));
        assert_eq!(issue.kind, IssueKind::Traversal);
    }

    #[test]
    fn test_complete_sets_status() {
        let mut report = ScanReport::new("/scan");
        assert_eq!(report.status, ScanStatus::Running);
        report.complete();
        assert_eq!(report.status, ScanStatus::Completed);
        assert!(report.duration_ms().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_serialize_lossily() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = PathBuf::from(OsStr::from_bytes(b"/srv/\xffwww"));
        let shell = root.join(OsStr::from_bytes(b"sh\xffell.php"));

        let mut report = ScanReport::new(&root);
        report.record_detection(Detection::new(shell.clone(), 0, "eval"));
        report.record_skip(root.join(OsStr::from_bytes(b"\xfe.png")), SkipReason::Binary("png"));
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        report.record_issue(&Error::file_read(&shell, denied));

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["target"], "/srv/\u{FFFD}www");
        assert_eq!(value["infected_files"][0], "/srv/\u{FFFD}www/sh\u{FFFD}ell.php");
        assert_eq!(value["detections"][0]["path"], "/srv/\u{FFFD}www/sh\u{FFFD}ell.php");
        assert_eq!(value["skipped"][0]["path"], "/srv/\u{FFFD}www/\u{FFFD}.png");
        assert_eq!(value["errors"][0]["path"], "/srv/\u{FFFD}www/sh\u{FFFD}ell.php");
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::Binary("png").to_string(), "binary file (png)");
    }
}
