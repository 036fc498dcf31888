//! Candidate file discovery.

use crate::core::config::ScanConfig;
use crate::core::error::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// File extensions to include, without the dot. Empty means all files.
    pub extensions: Vec<String>,
    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,
    /// Path fragments that prune an entry and everything below it.
    pub exclude_paths: Vec<String>,
}

impl WalkOptions {
    /// Set file extensions to include.
    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.extensions = extensions.iter().map(|e| e.as_ref().to_string()).collect();
        self
    }

    /// Set whether to follow symlinks.
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Add a path fragment to exclude.
    pub fn with_exclude(mut self, fragment: impl Into<String>) -> Self {
        self.exclude_paths.push(fragment.into());
        self
    }
}

impl From<&ScanConfig> for WalkOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            follow_symlinks: config.follow_symlinks,
            exclude_paths: config.exclude_paths.clone(),
        }
    }
}

/// Lazy, pre-order file walker.
#[derive(Debug, Clone)]
pub struct Walker {
    options: WalkOptions,
}

impl Walker {
    pub fn new(options: WalkOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// Check if a path matches the extension allow-list (case-sensitive).
    pub fn matches_extension(&self, path: &Path) -> bool {
        if self.options.extensions.is_empty() {
            return true;
        }

        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.options.extensions.iter().any(|allowed| allowed == ext))
    }

    /// Check if a path should be excluded from traversal.
    pub fn should_exclude(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.options
            .exclude_paths
            .iter()
            .any(|excluded| path_str.contains(excluded.as_str()))
    }

    /// Enumerate candidate files under `root`.
    ///
    /// A regular-file root yields just itself, bypassing the extension
    /// filter; any other non-directory root (FIFO, device, socket) yields a
    /// read error. The root is always resolved through symlinks; the
    /// `follow_symlinks` option only governs links found below it.
    /// Directory errors are yielded in place and the walk continues with
    /// the remaining entries.
    pub fn walk<'a>(
        &'a self,
        root: &Path,
    ) -> Result<Box<dyn Iterator<Item = Result<PathBuf>> + 'a>> {
        let metadata = match std::fs::metadata(root) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::PathNotFound(root.to_path_buf()));
            }
            Err(e) => return Err(Error::directory_access(root, e)),
        };

        if metadata.is_file() {
            return Ok(Box::new(std::iter::once(Ok(root.to_path_buf()))));
        }

        if !metadata.is_dir() {
            log::debug!("Not a regular file: {:?}", root);
            let error = Error::file_read(
                root,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            );
            return Ok(Box::new(std::iter::once(Err(error))));
        }

        let root_path = root.to_path_buf();
        let entries = WalkDir::new(root)
            .follow_links(self.options.follow_symlinks)
            .follow_root_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| e.depth() == 0 || !self.should_exclude(e.path()))
            .filter_map(move |entry| match entry {
                Ok(entry) => self.candidate(entry).map(Ok),
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root_path.clone());
                    log::debug!("Cannot access {:?}: {}", path, e);
                    Some(Err(Error::directory_access(path, io::Error::from(e))))
                }
            });

        Ok(Box::new(entries))
    }

    fn candidate(&self, entry: DirEntry) -> Option<PathBuf> {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            log::debug!("Entering directory {:?}", entry.path());
            return None;
        }

        if !file_type.is_file() || !self.matches_extension(entry.path()) {
            return None;
        }

        Some(entry.into_path())
    }
}
