//! Command-line interface definition.

use crate::core::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sigsweep: signature-based scanner for web shells and injected code
#[derive(Parser, Debug)]
#[command(name = "sigsweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Use this configuration file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also append log output to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine processing
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a file or directory tree
    Scan {
        /// File or directory to scan
        path: PathBuf,

        /// Signature list (one pattern per line); built-in list if omitted
        #[arg(short, long)]
        signatures: Option<PathBuf>,

        /// Move infected files into this directory after the scan
        #[arg(long)]
        quarantine: Option<PathBuf>,

        /// Files above this many bytes are scanned in chunks
        #[arg(long)]
        max_file_size: Option<u64>,

        /// Chunk size in bytes for large files
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Bytes carried between chunks (widened to fit literal signatures)
        #[arg(long)]
        carry_window: Option<usize>,

        /// Comma-separated extension allow-list (e.g. php,js,html)
        #[arg(short, long, value_delimiter = ',')]
        extensions: Option<Vec<String>>,

        /// Path fragment to exclude (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Follow symbolic links
        #[arg(long)]
        follow_symlinks: bool,

        /// Export results to file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the active signatures
    Signatures {
        /// Signature list to load instead of the configured one
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file location
    Path,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Scan options given on the command line, applied over the loaded config.
#[derive(Debug, Clone, Default)]
pub struct ScanOverrides {
    pub signatures: Option<PathBuf>,
    pub quarantine: Option<PathBuf>,
    pub max_file_size: Option<u64>,
    pub chunk_size: Option<usize>,
    pub carry_window: Option<usize>,
    pub extensions: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub follow_symlinks: bool,
}

impl ScanOverrides {
    /// Apply the overrides to a configuration.
    pub fn apply(self, config: &mut Config) {
        if let Some(path) = self.signatures {
            config.signatures.path = Some(path);
        }
        if let Some(dir) = self.quarantine {
            config.quarantine.dir = Some(dir);
        }
        if let Some(size) = self.max_file_size {
            config.scan.max_file_size = size;
        }
        if let Some(size) = self.chunk_size {
            config.scan.chunk_size = size;
        }
        if let Some(size) = self.carry_window {
            config.scan.carry_window = size;
        }
        if let Some(extensions) = self.extensions {
            config.scan.extensions = extensions
                .into_iter()
                .map(|e| e.trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect();
        }
        config.scan.exclude_paths.extend(self.exclude);
        if self.follow_symlinks {
            config.scan.follow_symlinks = true;
        }
    }
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan() {
        let cli = Cli::try_parse_from([
            "sigsweep",
            "--format",
            "json",
            "scan",
            "/var/www",
            "--extensions",
            "php,js",
            "--quarantine",
            "/tmp/q",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Scan {
                path,
                extensions,
                quarantine,
                ..
            } => {
                assert_eq!(path, PathBuf::from("/var/www"));
                assert_eq!(extensions, Some(vec!["php".to_string(), "js".to_string()]));
                assert_eq!(quarantine, Some(PathBuf::from("/tmp/q")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_scan_requires_path() {
        assert!(Cli::try_parse_from(["sigsweep", "scan"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["sigsweep", "-v", "-q", "signatures"]).is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        ScanOverrides {
            max_file_size: Some(4096),
            extensions: Some(vec![".php".to_string(), " js".to_string(), String::new()]),
            exclude: vec!["vendor".to_string()],
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(config.scan.max_file_size, 4096);
        assert_eq!(config.scan.extensions, vec!["php".to_string(), "js".to_string()]);
        assert_eq!(config.scan.exclude_paths, vec!["vendor".to_string()]);
        assert!(config.validate().is_ok());
    }
}
