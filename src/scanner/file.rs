//! Scan session: walks a target and builds the report.

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{Detection, ScanReport, ScanVerdict, SkipReason};
use crate::detection::{ContentScanner, SignatureSet, StreamOptions};
use crate::scanner::filetype::{BinaryClassifier, BinaryFormatMarker};
use crate::scanner::walker::{WalkOptions, Walker};
use crate::utils::hash::HashCalculator;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A candidate whose header has been read.
struct OpenedFile {
    file: File,
    size: u64,
    binary: Option<&'static BinaryFormatMarker>,
}

/// One scan over a target path.
pub struct ScanSession {
    config: Arc<Config>,
    walker: Walker,
    scanner: ContentScanner,
    cancelled: Arc<AtomicBool>,
}

impl ScanSession {
    /// Create a session with an already loaded signature set.
    pub fn new(config: Arc<Config>, signatures: Arc<SignatureSet>) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let walker = Walker::new(WalkOptions::from(&config.scan));
        let scanner = ContentScanner::new(signatures, StreamOptions::from(&config.scan))
            .with_cancel_flag(Arc::clone(&cancelled));

        Self {
            config,
            walker,
            scanner,
            cancelled,
        }
    }

    /// Create a session, loading signatures as configured.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let signatures = SignatureSet::load(config.signatures.path.as_deref())?;
        log::debug!("Using {} signatures ({})", signatures.len(), signatures.source());
        Ok(Self::new(config, Arc::new(signatures)))
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// The active signature set.
    pub fn signatures(&self) -> &Arc<SignatureSet> {
        self.scanner.signatures()
    }

    /// Cancel the current scan.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if the scan has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Shared cancel flag, for cancelling from another thread.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Scan a file or directory tree.
    ///
    /// Only a missing root is an error. Per-file and per-directory failures
    /// go into the report's error list.
    pub fn run(&self, target: &Path) -> Result<ScanReport> {
        log::info!("Starting scan of {:?}", target);
        let entries = self.walker.walk(target)?;
        let mut report = ScanReport::new(target);

        for entry in entries {
            if self.is_cancelled() {
                break;
            }

            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    log::warn!("{}", e);
                    report.record_issue(&e);
                    continue;
                }
            };

            let opened = match self.open(&path) {
                Ok(opened) => opened,
                Err(e) => {
                    log::warn!("Skipping {:?}: {}", path, e);
                    report.record_issue(&e);
                    continue;
                }
            };
            report.record_scanned();

            match self.verdict(opened, &path) {
                Ok(verdict) => self.record(&mut report, path, verdict),
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    log::warn!("Failed to scan {:?}: {}", path, e);
                    report.record_issue(&e);
                }
            }
        }

        if self.is_cancelled() {
            report.cancel();
            log::warn!(
                "Scan cancelled after {} files; report is partial",
                report.total_scanned
            );
        } else {
            report.complete();
        }

        log::info!(
            "Scan finished: {} files scanned, {} threats found, {} skipped, {} errors",
            report.total_scanned,
            report.threats_found(),
            report.skipped.len(),
            report.errors.len()
        );

        Ok(report)
    }

    /// Classify and match a single file.
    pub fn scan_file(&self, path: &Path) -> Result<ScanVerdict> {
        let opened = self.open(path)?;
        self.verdict(opened, path)
    }

    /// Open a file, read its header and measure it.
    fn open(&self, path: &Path) -> Result<OpenedFile> {
        let mut file = File::open(path).map_err(|e| Error::file_read(path, e))?;
        let header =
            BinaryClassifier::read_header(&mut file).map_err(|e| Error::file_read(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| Error::file_read(path, e))?
            .len();

        Ok(OpenedFile {
            file,
            size,
            binary: BinaryClassifier::classify(&header),
        })
    }

    fn verdict(&self, opened: OpenedFile, path: &Path) -> Result<ScanVerdict> {
        if let Some(marker) = opened.binary {
            return Ok(ScanVerdict::Skipped(SkipReason::Binary(marker.name)));
        }

        let mut file = opened.file;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| Error::file_read(path, e))?;

        Ok(match self.scanner.scan(file, opened.size, path)? {
            Some(signature_index) => ScanVerdict::Infected { signature_index },
            None => ScanVerdict::Clean,
        })
    }

    fn record(&self, report: &mut ScanReport, path: PathBuf, verdict: ScanVerdict) {
        match verdict {
            ScanVerdict::Infected { signature_index } => {
                if report.is_infected(&path) {
                    return;
                }

                let signature = self
                    .signatures()
                    .get(signature_index)
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                log::warn!(
                    "Threat detected: {:?} matched signature #{} ({})",
                    path,
                    signature_index,
                    signature
                );

                let mut detection = Detection::new(path, signature_index, signature);
                match HashCalculator::sha256_file(&detection.path) {
                    Ok(hash) => detection = detection.with_sha256(hash),
                    Err(e) => log::debug!("Could not hash {:?}: {}", detection.path, e),
                }
                report.record_detection(detection);
            }
            ScanVerdict::Skipped(reason) => {
                log::debug!("Skipping {:?}: {}", path, reason);
                report.record_skip(path, reason);
            }
            ScanVerdict::Clean => {
                log::trace!("Clean: {:?}", path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IssueKind, ScanStatus};
    use std::fs;
    use tempfile::TempDir;

    const WEB_SHELL: &str = "<?php eval($_POST['cmd']); ?>";

    fn session_with(config: Config) -> ScanSession {
        ScanSession::new(Arc::new(config), Arc::new(SignatureSet::default_signatures()))
    }

    fn default_session() -> ScanSession {
        session_with(Config::default())
    }

    fn create_site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.php"), WEB_SHELL).unwrap();
        fs::write(dir.path().join("b.txt"), "hello, nothing to see here\n").unwrap();

        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png.extend_from_slice(WEB_SHELL.as_bytes());
        fs::write(dir.path().join("c.png"), png).unwrap();
        dir
    }

    #[test]
    fn test_scan_directory() {
        let dir = create_site();
        let mut config = Config::default();
        config.scan.extensions.push("png".to_string());

        let report = session_with(config).run(dir.path()).unwrap();

        assert_eq!(report.status, ScanStatus::Completed);
        assert_eq!(report.total_scanned, 3);
        assert_eq!(report.infected_files, vec![dir.path().join("a.php")]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, dir.path().join("c.png"));
        assert_eq!(report.skipped[0].reason, SkipReason::Binary("png"));
        assert!(report.errors.is_empty());

        let detection = &report.detections[0];
        let expected = HashCalculator::sha256_bytes(WEB_SHELL.as_bytes());
        assert_eq!(detection.sha256.as_deref(), Some(expected.as_str()));
        assert!(!detection.signature.is_empty());
    }

    #[test]
    fn test_single_infected_php() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.php");
        fs::write(&path, "<?php eval($_POST['c']); ?>").unwrap();

        let report = default_session().run(dir.path()).unwrap();
        assert_eq!(report.total_scanned, 1);
        assert_eq!(report.infected_files, vec![path]);
    }

    #[test]
    fn test_default_extensions_exclude_images() {
        let dir = create_site();
        let report = default_session().run(dir.path()).unwrap();

        assert_eq!(report.total_scanned, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(report.threats_found(), 1);
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let report = default_session().run(dir.path()).unwrap();

        assert_eq!(report.total_scanned, 0);
        assert!(report.infected_files.is_empty());
        assert_eq!(report.status, ScanStatus::Completed);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = default_session().run(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::PathNotFound(_)));
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let dir = create_site();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("z.js"), "eval(base64_decode('aGk='));").unwrap();

        let session = default_session();
        let first = session.run(dir.path()).unwrap();
        let second = session.run(dir.path()).unwrap();

        assert_eq!(first.total_scanned, second.total_scanned);
        assert_eq!(first.infected_files, second.infected_files);
        assert_eq!(first.threats_found(), 2);
        assert_ne!(first.scan_id, second.scan_id);
    }

    #[test]
    fn test_extension_filter_and_single_file() {
        let dir = TempDir::new().unwrap();
        let payload = dir.path().join("payload.bin");
        fs::write(&payload, WEB_SHELL).unwrap();

        let session = default_session();
        let report = session.run(dir.path()).unwrap();
        assert_eq!(report.total_scanned, 0);

        let report = session.run(&payload).unwrap();
        assert_eq!(report.total_scanned, 1);
        assert_eq!(report.infected_files, vec![payload]);
    }

    #[test]
    fn test_short_file_is_text_assumed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.php");
        fs::write(&path, "MZ").unwrap();

        assert_eq!(default_session().scan_file(&path).unwrap(), ScanVerdict::Clean);
    }

    #[test]
    fn test_large_file_is_streamed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.php");
        let mut content = "// padding line\n".repeat(400);
        content.insert_str(1000, WEB_SHELL);
        fs::write(&path, &content).unwrap();

        let mut config = Config::default();
        config.scan.max_file_size = 1024;
        config.scan.chunk_size = 256;
        let session = session_with(config);

        assert!(session.scanner.uses_streaming(content.len() as u64));
        assert!(session.scan_file(&path).unwrap().is_infected());

        let report = session.run(dir.path()).unwrap();
        assert_eq!(report.threats_found(), 1);
        assert!(report.detections[0].sha256.is_some());
    }

    #[test]
    fn test_custom_signatures() {
        let dir = TempDir::new().unwrap();
        let rules = TempDir::new().unwrap();
        let list = rules.path().join("sigs.txt");
        fs::write(&list, "# house rules\nliteral:DROP TABLE\n/union\\s+select/i\n").unwrap();
        fs::write(dir.path().join("q.sql"), "SELECT 1 UNION   SELECT password").unwrap();
        fs::write(dir.path().join("a.php"), WEB_SHELL).unwrap();

        let mut config = Config::default();
        config.signatures.path = Some(list);
        let session = ScanSession::from_config(Arc::new(config)).unwrap();
        assert_eq!(session.signatures().len(), 2);

        let report = session.run(dir.path()).unwrap();
        assert_eq!(report.infected_files, vec![dir.path().join("q.sql")]);
        assert_eq!(report.detections[0].signature_index, 1);
    }

    #[test]
    fn test_missing_signature_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.signatures.path = Some(dir.path().join("absent.txt"));

        let err = ScanSession::from_config(Arc::new(config)).err().unwrap();
        assert!(matches!(err, Error::SignatureLoad(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_cancelled_session() {
        let dir = create_site();
        let session = default_session();
        session.cancel();

        let report = session.run(dir.path()).unwrap();
        assert_eq!(report.status, ScanStatus::Cancelled);
        assert_eq!(report.total_scanned, 0);
        assert!(report.end_time.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_reported() {
        use std::os::unix::fs::PermissionsExt;

        let dir = create_site();
        let locked = dir.path().join("locked.php");
        fs::write(&locked, WEB_SHELL).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still open the file.
        if File::open(&locked).is_ok() {
            return;
        }

        let report = default_session().run(dir.path()).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(report.status, ScanStatus::Completed);
        assert_eq!(report.total_scanned, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, IssueKind::FileRead);
        assert_eq!(report.errors[0].path.as_deref(), Some(locked.as_path()));
        assert!(!report.is_infected(&locked));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_root_is_scanned() {
        let dir = create_site();
        let link_dir = TempDir::new().unwrap();
        let link = link_dir.path().join("site");
        std::os::unix::fs::symlink(dir.path(), &link).unwrap();

        let report = default_session().run(&link).unwrap();
        assert_eq!(report.total_scanned, 2);
        assert_eq!(report.infected_files, vec![link.join("a.php")]);
        assert!(report.errors.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_root_is_reported_not_read() {
        let dir = TempDir::new().unwrap();
        let fifo = dir.path().join("pipe.php");
        let created = std::process::Command::new("mkfifo")
            .arg(&fifo)
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !created {
            return;
        }

        let report = default_session().run(&fifo).unwrap();
        assert_eq!(report.status, ScanStatus::Completed);
        assert_eq!(report.total_scanned, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, IssueKind::FileRead);
        assert_eq!(report.errors[0].path.as_deref(), Some(fifo.as_path()));
    }
}
