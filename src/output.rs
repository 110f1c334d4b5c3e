//! Output formatting and styling module.
//!
//! Provides a centralized interface for all terminal output: colored status
//! lines, the progress bar shown while files are processed, and the
//! end-of-run summary table.

use crate::file_category::Category;
use crate::report::RunReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use smartsort::output::OutputFormatter;
    /// OutputFormatter::success("Organization complete");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar whose length grows as sources are scanned.
    pub fn create_progress_bar() -> ProgressBar {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints a summary table with file counts by category.
    pub fn summary_table(category_counts: &BTreeMap<Category, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let max_category_len = category_counts
            .keys()
            .map(|name| name.as_str().chars().count())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in category_counts {
            let file_word = if *count == 1 { "file" } else { "files" };
            println!(
                "{:<width$} | {} {}",
                category.as_str(),
                count.to_string().green(),
                file_word,
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            if total_files == 1 { "file" } else { "files" },
            width = max_category_len
        );
    }

    /// Prints the end-of-run summary: category table, outcome totals and
    /// every failure with its reason.
    pub fn run_summary(report: &RunReport) {
        let totals = report.totals();
        let counts = report.category_counts();
        let organized: usize = counts.values().sum();

        Self::summary_table(&counts, organized);

        println!();
        println!("Scanned:       {}", totals.scanned);
        if report.dry_run {
            println!("Would move:    {}", totals.would_move.to_string().yellow());
        } else {
            println!("Moved:         {}", totals.moved.to_string().green());
        }
        println!("Skipped:       {}", totals.skipped);
        let failed = totals.failed.to_string();
        println!(
            "Failed:        {}",
            if totals.failed > 0 { failed.red() } else { failed.normal() }
        );
        println!("Summarized:    {}", report.files_summarized());
        println!("Smart folders: {}", report.smart_folders());

        if totals.failed > 0 {
            Self::header("FAILURES");
            for (path, reason) in report.failures() {
                Self::error(&format!("{}: {}", path.display(), reason));
            }
        }

        if !report.source_errors().is_empty() {
            Self::header("UNAVAILABLE SOURCES");
            for error in report.source_errors() {
                Self::warning(&format!("{}: {}", error.path.display(), error.reason));
            }
        }
    }
}
