//! Configuration management for sigsweep.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Files larger than this are scanned in streaming mode (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Read size for streaming mode (32 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Bytes carried from one streaming chunk into the next.
pub const DEFAULT_CARRY_WINDOW: usize = 512;

/// Extensions scanned during directory traversal.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "php", "js", "phtml", "phtm", "cgi", "pl", "o", "so", "py", "sh", "php3", "php4", "php5",
    "php6", "php7", "pht", "shtml", "susp", "suspected", "infected", "vir", "html", "htm", "tpl",
    "inc", "css", "txt", "sql",
];

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scan-related settings
    pub scan: ScanConfig,
    /// Signature source settings
    pub signatures: SignatureConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Quarantine settings
    pub quarantine: QuarantineConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigSave(format!("Failed to write config file: {}", e)))
    }

    /// Load configuration from the default location, falling back to defaults.
    ///
    /// Unlike an explicitly requested file, a broken default config only
    /// produces a warning.
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    log::warn!("Failed to load config, using defaults: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        Self::data_dir().join("config.json")
    }

    /// Get the application data directory.
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("sigsweep")
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.scan.max_file_size == 0 {
            return Err(Error::ConfigInvalid {
                field: "scan.max_file_size".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.scan.chunk_size == 0 {
            return Err(Error::ConfigInvalid {
                field: "scan.chunk_size".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.scan.carry_window == 0 {
            return Err(Error::ConfigInvalid {
                field: "scan.carry_window".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.scan.extensions.iter().any(|e| e.is_empty() || e.starts_with('.')) {
            return Err(Error::ConfigInvalid {
                field: "scan.extensions".to_string(),
                message: "Extensions must be non-empty and written without a leading dot"
                    .to_string(),
            });
        }

        Ok(())
    }
}

/// Scan-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Files above this size (bytes) are scanned chunk by chunk
    pub max_file_size: u64,
    /// Streaming read size (bytes)
    pub chunk_size: usize,
    /// Bytes kept between streaming chunks
    pub carry_window: usize,
    /// Extension allow-list for directory scans (case-sensitive, no dot)
    pub extensions: Vec<String>,
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Path fragments to exclude from traversal
    pub exclude_paths: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            carry_window: DEFAULT_CARRY_WINDOW,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            follow_symlinks: false,
            exclude_paths: Vec::new(),
        }
    }
}

/// Signature source configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// External signature list (one pattern per line); built-in list when unset
    pub path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Append log lines to this file as well as the console
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_file: None,
        }
    }
}

/// Quarantine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarantineConfig {
    /// Move infected files here after the scan; no moves when unset
    pub dir: Option<PathBuf>,
}
