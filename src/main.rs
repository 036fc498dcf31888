//! sigsweep: signature-based scanner for web shells and injected code.
//!
//! This is the main entry point for the CLI application.
//!
//! Exit status: 0 when nothing was flagged, 1 when threats were found,
//! 2 when the scan could not run.

use sigsweep::core::config::Config;
use sigsweep::core::error::{format_error_for_user, Result};
use sigsweep::detection::SignatureSet;
use sigsweep::quarantine::Quarantine;
use sigsweep::scanner::ScanSession;
use sigsweep::ui::cli::{Cli, Commands, ConfigAction, OutputFormat, ScanOverrides};
use sigsweep::ui::report::{render_with_quarantine, write_report, ReportFormat};
use sigsweep::utils::logging::{init_logging, LogConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

const EXIT_THREATS_FOUND: u8 = 1;
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", format_error_for_user(&e));
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();

    // An explicitly requested config file must load; the default one may not exist.
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::from_config(&config)
    };
    if let Some(path) = cli.log_file.clone().or_else(|| config.logging.log_file.clone()) {
        log_config = log_config.with_file(path);
    }
    init_logging(log_config)?;

    log::info!("sigsweep v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Scan {
            path,
            signatures,
            quarantine,
            max_file_size,
            chunk_size,
            carry_window,
            extensions,
            exclude,
            follow_symlinks,
            output,
        } => {
            let overrides = ScanOverrides {
                signatures,
                quarantine,
                max_file_size,
                chunk_size,
                carry_window,
                extensions,
                exclude,
                follow_symlinks,
            };
            run_scan(config, &path, overrides, output, cli.format)
        }
        Commands::Signatures { file } => run_signatures(&config, file, cli.format),
        Commands::Config { action } => {
            let config_path = cli.config.unwrap_or_else(Config::default_config_path);
            run_config(action, &config, &config_path)
        }
    }
}

/// Run a scan and act on the result.
fn run_scan(
    mut config: Config,
    path: &Path,
    overrides: ScanOverrides,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<ExitCode> {
    overrides.apply(&mut config);
    config.validate()?;
    let config = Arc::new(config);

    let session = ScanSession::from_config(Arc::clone(&config))?;
    let report = session.run(path)?;

    let quarantine = match &config.quarantine.dir {
        Some(dir) if !report.is_clean() => {
            Some(Quarantine::new(dir).isolate_all(&report.infected_files))
        }
        _ => None,
    };

    let rendered = render_with_quarantine(&report, quarantine.as_ref(), format.into())?;
    print!("{}", rendered);
    if format == OutputFormat::Json {
        println!();
    }

    if let Some(output) = output {
        let file_format = ReportFormat::from_path(&output).unwrap_or_else(|| format.into());
        write_report(&report, quarantine.as_ref(), file_format, &output)?;
    }

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_THREATS_FOUND))
    }
}

/// List the active signatures.
fn run_signatures(config: &Config, file: Option<PathBuf>, format: OutputFormat) -> Result<ExitCode> {
    let path = file.or_else(|| config.signatures.path.clone());
    let signatures = SignatureSet::load(path.as_deref())?;

    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = signatures
                .iter()
                .enumerate()
                .map(|(index, signature)| {
                    serde_json::json!({ "index": index, "signature": signature.to_string() })
                })
                .collect();
            let document = serde_json::json!({
                "source": signatures.source().to_string(),
                "count": signatures.len(),
                "signatures": entries,
            });
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        OutputFormat::Text => {
            println!("Signatures: {} ({})", signatures.len(), signatures.source());
            for (index, signature) in signatures.iter().enumerate() {
                println!("  #{:<3} {}", index, signature);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Handle configuration commands.
fn run_config(action: ConfigAction, config: &Config, config_path: &Path) -> Result<ExitCode> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Reset { yes } => {
            if !yes {
                println!("This overwrites {} with defaults.", config_path.display());
                println!("Run again with --yes to confirm.");
                return Ok(ExitCode::SUCCESS);
            }
            log::info!("Resetting configuration to defaults...");
            Config::default().save(config_path)?;
            println!("Configuration reset to defaults.");
        }
    }
    Ok(ExitCode::SUCCESS)
}
