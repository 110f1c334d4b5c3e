//! Command-line interface module for smartsort.
//!
//! This module handles all CLI-related functionality including:
//! - Flag parsing
//! - Configuration loading and command-line overrides
//! - Organization orchestration
//! - Persisting the activity log and run report

use crate::config::{Config, ConfigError, expand_tilde};
use crate::file_organizer::{OrganizeError, Organizer};
use crate::output::OutputFormatter;
use crate::report::{ActivityLog, ReportError, RunReport, write_report_file};
use crate::summarizer::{CommandSummarizer, DisabledSummarizer, Summarizer};
use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

/// Sort files into category folders, optionally refined by content.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "smartsort", version, about)]
pub struct Cli {
    /// Source folder to organize (replaces the configured sources)
    #[arg(long, value_name = "PATH")]
    pub source: Option<PathBuf>,

    /// Destination folder for organized files
    #[arg(long, value_name = "PATH")]
    pub dest: Option<PathBuf>,

    /// Path to a JSON or TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Show what would be moved without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Directory for the activity log and run reports
    #[arg(long, value_name = "PATH")]
    pub log_dir: Option<PathBuf>,

    /// Print debug diagnostics instead of the progress bar
    #[arg(short, long)]
    pub verbose: bool,
}

/// Fatal errors: the run could not start, or no source was usable.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Source directory does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error(transparent)]
    Organize(#[from] OrganizeError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Loads the configuration and applies command-line overrides.
///
/// # Errors
///
/// Fails when the configuration is missing or invalid, or when `--source`
/// names a directory that does not exist.
pub fn load_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(source) = &cli.source {
        let source = expand_tilde(source);
        if !source.is_dir() {
            return Err(CliError::SourceNotFound(source));
        }
        tracing::info!(source = %source.display(), "Using source directory from command line");
        config.source_directories = vec![source];
    }

    if let Some(dest) = &cli.dest {
        config.destination_directory = expand_tilde(dest);
        tracing::info!(dest = %config.destination_directory.display(), "Using destination directory from command line");
    }

    if let Some(log_dir) = &cli.log_dir {
        config.log_directory = expand_tilde(log_dir);
    }

    config.validate()?;
    Ok(config)
}

/// Runs one organization pass as described by `cli`.
///
/// Per-file failures do not make this return an error; they are listed in
/// the returned report, the activity log and the printed summary.
///
/// # Examples
///
/// ```no_run
/// use smartsort::cli::{Cli, run_cli};
/// use std::path::PathBuf;
///
/// let cli = Cli {
///     source: Some(PathBuf::from("/path/to/Downloads")),
///     dry_run: true,
///     ..Cli::default()
/// };
/// match run_cli(&cli) {
///     Ok(report) => println!("{} files scanned", report.totals().scanned),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<RunReport, CliError> {
    let config = load_config(cli)?;

    let summarizer: Box<dyn Summarizer> = match &config.summarizer {
        Some(settings) if config.organize_by_content => Box::new(CommandSummarizer::new(settings)),
        _ => Box::new(DisabledSummarizer),
    };

    let mut activity = ActivityLog::open(&config.log_directory)?;

    if cli.dry_run {
        OutputFormatter::dry_run_notice("No files will be moved.");
    }
    OutputFormatter::info(&format!(
        "Organizing into: {}",
        config.destination_directory.display()
    ));

    let mut organizer = Organizer::new(&config, summarizer.as_ref())?;
    let progress = (!cli.verbose).then(OutputFormatter::create_progress_bar);
    if let Some(pb) = &progress {
        organizer = organizer.with_progress(pb.clone());
    }

    let result = organizer.run(cli.dry_run, Some(&mut activity));
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }
    let report = result?;

    OutputFormatter::run_summary(&report);

    match write_report_file(
        &report,
        &config.log_directory,
        &config.source_directories,
        &config.destination_directory,
    ) {
        Ok(path) => OutputFormatter::info(&format!("Report saved to: {}", path.display())),
        Err(e) => OutputFormatter::warning(&format!("Could not save report: {}", e)),
    }
    OutputFormatter::info(&format!("Activity log: {}", activity.path().display()));

    if cli.dry_run {
        OutputFormatter::success("Dry run complete. No files were modified.");
    } else if report.totals().failed > 0 {
        OutputFormatter::warning("Some files could not be organized. Please review errors above.");
    } else {
        OutputFormatter::success("Organization complete!");
    }

    Ok(report)
}
