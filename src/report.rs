//! Run reporting and the persistent activity log.
//!
//! Every per-file decision ends up in two places: the in-memory [`RunReport`]
//! returned by the organizer, and one JSON line in the append-only
//! `activity.jsonl` file. The activity log is only ever opened in append mode;
//! earlier runs' entries are never rewritten.
use crate::file_category::Category;
use chrono::{DateTime, Local};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the append-only activity log inside the log directory.
pub const ACTIVITY_LOG_FILE: &str = "activity.jsonl";

/// Errors raised while persisting logs and reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode log entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What happened to one discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Moved,
    /// Dry run: the file would have been moved to the recorded destination.
    WouldMove,
    Skipped { reason: String },
    Failed { reason: String },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Moved => "moved",
            Outcome::WouldMove => "would_move",
            Outcome::Skipped { .. } => "skipped",
            Outcome::Failed { .. } => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Skipped { reason } | Outcome::Failed { reason } => Some(reason),
            Outcome::Moved | Outcome::WouldMove => None,
        }
    }
}

/// The record of one discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub source: PathBuf,
    pub extension: Option<String>,
    /// `None` when metadata could not be read.
    pub size: Option<u64>,
    pub category: Category,
    pub summary: Option<String>,
    pub suggested_folder: Option<String>,
    pub destination: Option<PathBuf>,
    pub outcome: Outcome,
}

/// A configured source directory that could not be organized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub path: PathBuf,
    pub reason: String,
}

/// Aggregate counts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTotals {
    pub scanned: usize,
    pub moved: usize,
    pub would_move: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Complete record of one organization run.
///
/// Built by the organizer while it runs and sealed by [`RunReport::finish`].
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub dry_run: bool,
    records: Vec<FileRecord>,
    source_errors: Vec<SourceError>,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Local::now(),
            finished_at: None,
            dry_run,
            records: Vec::new(),
            source_errors: Vec::new(),
        }
    }

    pub fn push(&mut self, record: FileRecord) {
        self.records.push(record);
    }

    pub fn push_source_error(&mut self, path: PathBuf, reason: String) {
        self.source_errors.push(SourceError { path, reason });
    }

    /// Stamps the end time.
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Local::now());
        self
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn source_errors(&self) -> &[SourceError] {
        &self.source_errors
    }

    pub fn totals(&self) -> OutcomeTotals {
        let mut totals = OutcomeTotals {
            scanned: self.records.len(),
            ..OutcomeTotals::default()
        };
        for record in &self.records {
            match record.outcome {
                Outcome::Moved => totals.moved += 1,
                Outcome::WouldMove => totals.would_move += 1,
                Outcome::Skipped { .. } => totals.skipped += 1,
                Outcome::Failed { .. } => totals.failed += 1,
            }
        }
        totals
    }

    /// Files per category, excluding skipped files.
    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            if !matches!(record.outcome, Outcome::Skipped { .. }) {
                *counts.entry(record.category.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn files_summarized(&self) -> usize {
        self.records.iter().filter(|r| r.summary.is_some()).count()
    }

    /// Distinct category/folder pairs that came from content suggestions.
    pub fn smart_folders(&self) -> usize {
        let mut folders: Vec<(&Category, &str)> = self
            .records
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Moved | Outcome::WouldMove))
            .filter_map(|r| r.suggested_folder.as_deref().map(|f| (&r.category, f)))
            .collect();
        folders.sort();
        folders.dedup();
        folders.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.records.iter().filter_map(|r| match &r.outcome {
            Outcome::Failed { reason } => Some((r.source.as_path(), reason.as_str())),
            _ => None,
        })
    }

    /// Human-readable summary block.
    pub fn render_summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = self.totals();

        writeln!(f, "smartsort - File Organization Report")?;
        writeln!(f, "{}", "=".repeat(40))?;
        writeln!(f, "Started:  {}", self.started_at.format("%Y-%m-%d %H:%M:%S"))?;
        if let Some(finished) = self.finished_at {
            writeln!(f, "Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"))?;
        }
        writeln!(f, "Mode:     {}", if self.dry_run { "dry run" } else { "live" })?;
        writeln!(f)?;
        writeln!(f, "Total files scanned: {}", totals.scanned)?;
        if self.dry_run {
            writeln!(f, "Would move:          {}", totals.would_move)?;
        } else {
            writeln!(f, "Moved:               {}", totals.moved)?;
        }
        writeln!(f, "Skipped:             {}", totals.skipped)?;
        writeln!(f, "Failed:              {}", totals.failed)?;
        writeln!(f, "Summarized:          {}", self.files_summarized())?;
        writeln!(f, "Smart folders:       {}", self.smart_folders())?;

        let counts = self.category_counts();
        if !counts.is_empty() {
            writeln!(f, "\nBy category:")?;
            for (category, count) in &counts {
                writeln!(f, "  {}: {}", category, count)?;
            }
        }

        let mut failures = self.failures().peekable();
        if failures.peek().is_some() {
            writeln!(f, "\nFailures:")?;
            for (path, reason) in failures {
                writeln!(f, "  - {}: {}", path.display(), reason)?;
            }
        }

        if !self.source_errors.is_empty() {
            writeln!(f, "\nUnavailable sources:")?;
            for error in &self.source_errors {
                writeln!(f, "  - {}: {}", error.path.display(), error.reason)?;
            }
        }

        Ok(())
    }
}

/// Append-only JSON-lines log of every organizer event.
#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    file: File,
}

impl ActivityLog {
    /// Opens (creating if needed) `activity.jsonl` in `log_dir`.
    pub fn open(log_dir: &Path) -> Result<Self, ReportError> {
        fs::create_dir_all(log_dir).map_err(|source| ReportError::Io {
            path: log_dir.to_path_buf(),
            source,
        })?;

        let path = log_dir.join(ACTIVITY_LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_file(&mut self, record: &FileRecord, dry_run: bool) -> Result<(), ReportError> {
        self.append(json!({
            "timestamp": Local::now().to_rfc3339(),
            "event": "file",
            "dry_run": dry_run,
            "source": record.source.to_string_lossy(),
            "destination": record.destination.as_ref().map(|d| d.to_string_lossy()),
            "category": record.category.as_str(),
            "outcome": record.outcome.label(),
            "reason": record.outcome.reason(),
            "size": record.size,
            "summary": record.summary,
            "suggested_folder": record.suggested_folder,
        }))
    }

    pub fn record_source_unavailable(&mut self, path: &Path, reason: &str) -> Result<(), ReportError> {
        self.append(json!({
            "timestamp": Local::now().to_rfc3339(),
            "event": "source_unavailable",
            "source": path.to_string_lossy(),
            "reason": reason,
        }))
    }

    pub fn record_run_summary(&mut self, report: &RunReport) -> Result<(), ReportError> {
        let totals = report.totals();
        let categories: BTreeMap<String, usize> = report
            .category_counts()
            .into_iter()
            .map(|(category, count)| (category.to_string(), count))
            .collect();

        self.append(json!({
            "timestamp": Local::now().to_rfc3339(),
            "event": "run_summary",
            "dry_run": report.dry_run,
            "started_at": report.started_at.to_rfc3339(),
            "finished_at": report.finished_at.map(|t| t.to_rfc3339()),
            "scanned": totals.scanned,
            "moved": totals.moved,
            "would_move": totals.would_move,
            "skipped": totals.skipped,
            "failed": totals.failed,
            "summarized": report.files_summarized(),
            "smart_folders": report.smart_folders(),
            "categories": categories,
            "unavailable_sources": report.source_errors().len(),
        }))
    }

    fn append(&mut self, entry: Value) -> Result<(), ReportError> {
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{}", line)
            .and_then(|_| self.file.flush())
            .map_err(|source| ReportError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Writes the rendered summary to a new `report_<timestamp>.txt` file.
///
/// An existing report with the same timestamp is never overwritten.
pub fn write_report_file(
    report: &RunReport,
    log_dir: &Path,
    sources: &[PathBuf],
    destination: &Path,
) -> Result<PathBuf, ReportError> {
    let io_err = |path: &Path, source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(log_dir).map_err(|e| io_err(log_dir, e))?;

    let stamp = report
        .finished_at
        .unwrap_or(report.started_at)
        .format("%Y%m%d_%H%M%S")
        .to_string();

    let source_lines: String = sources
        .iter()
        .map(|source| format!("- {}\n", source.display()))
        .collect();
    let body = format!(
        "{}\nSource Directories:\n{}\nDestination Directory: {}\n",
        report.render_summary(),
        source_lines,
        destination.display()
    );

    let mut attempt = 0;
    loop {
        let name = if attempt == 0 {
            format!("report_{}.txt", stamp)
        } else {
            format!("report_{}_{}.txt", stamp, attempt)
        };
        let path = log_dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(body.as_bytes())
                    .map_err(|e| io_err(&path, e))?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(io_err(&path, e)),
        }
    }
}
