//! Moving infected files into a quarantine directory.

use crate::core::error::{Error, Result};
use crate::core::types::lossy_path;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// A file that was moved into quarantine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantinedFile {
    #[serde(serialize_with = "lossy_path::serialize")]
    pub original: PathBuf,
    #[serde(serialize_with = "lossy_path::serialize")]
    pub destination: PathBuf,
}

/// A file that could not be moved.
#[derive(Debug, Clone, Serialize)]
pub struct QuarantineFailure {
    #[serde(serialize_with = "lossy_path::serialize")]
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of quarantining a batch of files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuarantineSummary {
    pub moved: Vec<QuarantinedFile>,
    pub failed: Vec<QuarantineFailure>,
}

impl QuarantineSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Quarantine directory manager.
#[derive(Debug, Clone)]
pub struct Quarantine {
    dir: PathBuf,
}

impl Quarantine {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The quarantine directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Move one file to `<dir>/<file name>`.
    ///
    /// An existing destination is never overwritten.
    pub fn isolate(&self, path: &Path) -> Result<PathBuf> {
        let name = path
            .file_name()
            .ok_or_else(|| Error::quarantine_failed(path, "path has no file name"))?;

        fs::create_dir_all(&self.dir).map_err(|e| Error::quarantine_failed(path, e))?;

        let dest = self.dir.join(name);
        safe_move(path, &dest)?;
        log::warn!("Quarantined {:?} -> {:?}", path, dest);
        Ok(dest)
    }

    /// Quarantine every path, continuing past failures.
    pub fn isolate_all<'a, I>(&self, paths: I) -> QuarantineSummary
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        let mut summary = QuarantineSummary::default();

        for path in paths {
            match self.isolate(path) {
                Ok(destination) => summary.moved.push(QuarantinedFile {
                    original: path.clone(),
                    destination,
                }),
                Err(e) => {
                    let message = match std::error::Error::source(&e) {
                        Some(source) => format!("{}: {}", e, source),
                        None => e.to_string(),
                    };
                    log::error!("{}", message);
                    summary.failed.push(QuarantineFailure {
                        path: path.clone(),
                        message,
                    });
                }
            }
        }

        log::info!(
            "Quarantine finished: {} moved, {} failed",
            summary.moved.len(),
            summary.failed.len()
        );
        summary
    }
}

/// Move `source` to `dest`, never replacing an existing `dest`.
///
/// A hard link claims the destination atomically. Where linking fails
/// (e.g. across filesystems) the content is copied into a file opened with
/// `create_new`, verified, and only then is the source removed.
fn safe_move(source: &Path, dest: &Path) -> Result<()> {
    match fs::hard_link(source, dest) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(source) {
                let _ = fs::remove_file(dest);
                return Err(Error::quarantine_failed(source, e));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(collision(source, dest)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::quarantine_failed(source, e)),
        Err(e) => {
            log::debug!("Cannot link {:?} into quarantine ({}); copying", source, e);
            copy_then_remove(source, dest)
        }
    }
}

fn copy_then_remove(source: &Path, dest: &Path) -> Result<()> {
    let mut input = File::open(source).map_err(|e| Error::quarantine_failed(source, e))?;
    let metadata = input
        .metadata()
        .map_err(|e| Error::quarantine_failed(source, e))?;

    let mut output = match OpenOptions::new().write(true).create_new(true).open(dest) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(collision(source, dest)),
        Err(e) => return Err(Error::quarantine_failed(source, e)),
    };

    // From here on `dest` is ours; drop it on any failure.
    let copied = io::copy(&mut input, &mut output).and_then(|copied| {
        output.sync_all()?;
        Ok(copied)
    });
    let copied = match copied {
        Ok(copied) => copied,
        Err(e) => {
            let _ = fs::remove_file(dest);
            return Err(Error::quarantine_failed(source, e));
        }
    };

    if copied != metadata.len() {
        let _ = fs::remove_file(dest);
        return Err(Error::quarantine_failed(source, "copy verification failed"));
    }

    if let Err(e) = fs::set_permissions(dest, metadata.permissions()) {
        log::debug!("Could not copy permissions to {:?}: {}", dest, e);
    }

    fs::remove_file(source).map_err(|e| Error::quarantine_failed(source, e))
}

fn collision(source: &Path, dest: &Path) -> Error {
    Error::quarantine_failed(
        source,
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination {} already exists", dest.display()),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_isolate_moves_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("shell.php");
        fs::write(&source, "<?php eval($_POST['x']);").unwrap();

        let quarantine = Quarantine::new(temp.path().join("q").join("nested"));
        let dest = quarantine.isolate(&source).unwrap();

        assert_eq!(dest, temp.path().join("q").join("nested").join("shell.php"));
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "<?php eval($_POST['x']);");
    }

    #[test]
    fn test_isolate_refuses_collision() {
        let temp = TempDir::new().unwrap();
        let qdir = temp.path().join("q");
        fs::create_dir(&qdir).unwrap();
        fs::write(qdir.join("shell.php"), "older").unwrap();

        let source = temp.path().join("shell.php");
        fs::write(&source, "newer").unwrap();

        let err = Quarantine::new(&qdir).isolate(&source).unwrap_err();
        assert!(matches!(err, Error::QuarantineFailed { .. }));
        assert!(err.is_recoverable());
        assert!(source.exists());
        assert_eq!(fs::read_to_string(qdir.join("shell.php")).unwrap(), "older");

        let message = std::error::Error::source(&err).unwrap().to_string();
        assert!(message.contains("already exists"));
    }

    #[test]
    fn test_isolate_missing_source() {
        let temp = TempDir::new().unwrap();
        let quarantine = Quarantine::new(temp.path().join("q"));

        let err = quarantine.isolate(&temp.path().join("gone.php")).unwrap_err();
        assert!(matches!(err, Error::QuarantineFailed { .. }));
    }

    #[test]
    fn test_isolate_all_continues_after_failure() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.php");
        let b = temp.path().join("b.php");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();
        let missing = temp.path().join("missing.php");

        let quarantine = Quarantine::new(temp.path().join("q"));
        let summary = quarantine.isolate_all(&[a.clone(), missing.clone(), b.clone()]);

        assert_eq!(summary.moved.len(), 2);
        assert_eq!(summary.moved[0].original, a);
        assert_eq!(summary.moved[1].original, b);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].path, missing);
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_safe_move_same_filesystem() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("x.js");
        let dest = temp.path().join("y.js");
        fs::write(&source, "payload").unwrap();

        safe_move(&source, &dest).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn test_safe_move_keeps_existing_destination() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("x.js");
        let dest = temp.path().join("y.js");
        fs::write(&source, "payload").unwrap();
        fs::write(&dest, "keep me").unwrap();

        let err = safe_move(&source, &dest).unwrap_err();
        assert!(matches!(err, Error::QuarantineFailed { .. }));
        assert_eq!(fs::read(&source).unwrap(), b"payload");
        assert_eq!(fs::read(&dest).unwrap(), b"keep me");
    }

    #[test]
    fn test_copy_fallback_moves_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("x.js");
        let dest = temp.path().join("y.js");
        fs::write(&source, "payload").unwrap();

        copy_then_remove(&source, &dest).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn test_copy_fallback_keeps_existing_destination() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("x.js");
        let dest = temp.path().join("y.js");
        fs::write(&source, "payload").unwrap();
        fs::write(&dest, "keep me").unwrap();

        let err = copy_then_remove(&source, &dest).unwrap_err();
        assert!(matches!(err, Error::QuarantineFailed { .. }));
        assert_eq!(fs::read(&source).unwrap(), b"payload");
        assert_eq!(fs::read(&dest).unwrap(), b"keep me");
    }
}
