//! Content summarization through an external tool.
//!
//! The external tool is a black box: it receives a file path as its last
//! argument and prints plain text. Every failure mode (spawn error, non-zero
//! exit, timeout, non-UTF-8 output, empty output) collapses into
//! [`Summarization::Unavailable`], so callers can always fall back to
//! extension-based categorization.
//!
//! Output protocol: a line starting with `folder:` (any case) carries the
//! suggested folder name; every other non-empty line is part of the summary.
//!
//! Results are not cached between runs; each eligible file is summarized on
//! every run.

use crate::config::SummarizerConfig;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Longest folder name accepted from the summarizer, in characters.
pub const MAX_FOLDER_NAME_LEN: usize = 50;

/// Longest summary kept, in characters.
pub const MAX_SUMMARY_LEN: usize = 500;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

const FOLDER_PREFIX: &str = "folder:";

/// A usable summary of a file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSummary {
    /// Short description of the content.
    pub summary: String,
    /// Sanitized folder name suggested for the file, if any.
    pub folder: Option<String>,
}

/// Result of one summarization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summarization {
    Summary(ContentSummary),
    /// The tool could not produce a usable answer; carries the reason.
    Unavailable(String),
}

impl Summarization {
    pub fn is_available(&self) -> bool {
        matches!(self, Summarization::Summary(_))
    }
}

/// A source of content summaries.
pub trait Summarizer {
    /// Summarizes the file at `path`. Must not panic or block past its own
    /// timeout.
    fn summarize(&self, path: &Path) -> Summarization;
}

/// Summarizer used when content organization is turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSummarizer;

impl Summarizer for DisabledSummarizer {
    fn summarize(&self, _path: &Path) -> Summarization {
        Summarization::Unavailable("content summarization is disabled".to_string())
    }
}

/// Runs an external program once per file, with a hard timeout.
#[derive(Debug, Clone)]
pub struct CommandSummarizer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSummarizer {
    pub fn new(config: &SummarizerConfig) -> Self {
        Self {
            program: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the program and returns its raw stdout.
    fn run(&self, path: &Path) -> Result<Vec<u8>, String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("failed to start '{}': {}", self.program, e))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| "summarizer stdout was not captured".to_string())?;

        // Drain stdout off-thread so a chatty tool cannot fill the pipe and stall.
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = sender.send(stdout.read_to_end(&mut buffer).map(|_| buffer));
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!("timed out after {:?}", self.timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!("failed waiting for summarizer: {}", e));
                }
            }
        };

        // A background process can keep stdout open after the tool exits.
        let remaining = deadline.saturating_duration_since(Instant::now());
        let output = match receiver.recv_timeout(remaining) {
            Ok(read) => read.map_err(|e| format!("failed reading summarizer output: {}", e))?,
            Err(RecvTimeoutError::Timeout) => {
                return Err(format!("timed out after {:?} waiting for output", self.timeout));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err("summarizer output reader stopped".to_string());
            }
        };

        if !status.success() {
            return Err(format!("summarizer exited with {}", status));
        }

        Ok(output)
    }
}

impl Summarizer for CommandSummarizer {
    fn summarize(&self, path: &Path) -> Summarization {
        let started = Instant::now();
        let result = self.run(path).and_then(|bytes| {
            String::from_utf8(bytes).map_err(|_| "summarizer output is not valid UTF-8".to_string())
        });

        match result {
            Ok(text) => {
                let summarization = parse_output(&text);
                tracing::debug!(
                    path = %path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    available = summarization.is_available(),
                    "Summarizer finished"
                );
                summarization
            }
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "Summarization unavailable");
                Summarization::Unavailable(reason)
            }
        }
    }
}

/// Interprets the text printed by the summarization tool.
///
/// ```
/// use smartsort::summarizer::{parse_output, Summarization};
///
/// let parsed = parse_output("Quarterly numbers\nFolder: Finance/2024\n");
/// let Summarization::Summary(summary) = parsed else { panic!() };
/// assert_eq!(summary.summary, "Quarterly numbers");
/// assert_eq!(summary.folder.as_deref(), Some("Finance2024"));
/// ```
pub fn parse_output(text: &str) -> Summarization {
    let mut folder = None;
    let mut summary_lines = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match strip_folder_prefix(line) {
            Some(raw) => folder = sanitize_folder_name(raw),
            None => summary_lines.push(line),
        }
    }

    let summary: String = summary_lines
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_SUMMARY_LEN)
        .collect();

    if summary.is_empty() {
        return Summarization::Unavailable("summarizer returned no summary".to_string());
    }

    Summarization::Summary(ContentSummary { summary, folder })
}

fn strip_folder_prefix(line: &str) -> Option<&str> {
    line.get(..FOLDER_PREFIX.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(FOLDER_PREFIX))
        .map(|_| &line[FOLDER_PREFIX.len()..])
}

/// Turns free text into a single safe path component.
///
/// Path separators, control characters and characters rejected by common
/// filesystems are dropped, whitespace is collapsed, leading/trailing dots
/// are removed and the result is capped at [`MAX_FOLDER_NAME_LEN`]
/// characters. Returns `None` when nothing usable is left.
pub fn sanitize_folder_name(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|&c| {
            !c.is_control() && !matches!(c, '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*')
        })
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c.is_whitespace());
    let capped: String = trimmed.chars().take(MAX_FOLDER_NAME_LEN).collect();
    let capped = capped.trim_end_matches(|c: char| c == '.' || c.is_whitespace());

    if capped.is_empty() {
        None
    } else {
        Some(capped.to_string())
    }
}
