//! Run configuration and file exclusion rules.
//!
//! Configuration is a JSON (or TOML, chosen by file extension) document that
//! is loaded once per run and never mutated afterwards. It is passed
//! explicitly into the organizer; nothing here is process-global.
//!
//! # Configuration File Format
//!
//! ```json
//! {
//!   "source_directories": ["~/Desktop", "~/Downloads"],
//!   "destination_directory": "~/Organized",
//!   "file_categories": {
//!     "Documents": [".pdf", ".txt"],
//!     "py": "Code"
//!   },
//!   "summarize_extensions": [".pdf", ".txt"],
//!   "organize_by_content": true,
//!   "smart_rename": true,
//!   "ignore_patterns": ["^\\."],
//!   "exclude_patterns": ["**/node_modules/**"],
//!   "summarizer": { "command": "summarize-file", "args": ["--short"], "timeout_secs": 30 }
//! }
//! ```
//!
//! `file_categories` accepts both shapes: `"ext": "Category"` and
//! `"Category": [".ext", ...]`.

use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::file_category::normalize_extension;

/// Name used for the config and data directories.
pub const APP_DIR_NAME: &str = "smartsort";

const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Errors that can occur while loading or validating configuration.
///
/// All of these are fatal: they abort the run before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid JSON/TOML syntax or structure.
    #[error("Invalid configuration in {}: {reason}", .path.display())]
    ConfigInvalid { path: PathBuf, reason: String },
    /// A required field is absent or empty.
    #[error("Missing required configuration field '{0}'")]
    MissingField(&'static str),
    /// A field is present but its value cannot be used.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    /// IO error while reading or writing configuration.
    #[error("IO error on configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One entry of the `file_categories` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryEntry {
    /// `"ext": "Category"`
    Category(String),
    /// `"Category": [".ext", ...]`
    Extensions(Vec<String>),
}

/// External summarization tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Program to run.
    pub command: String,
    /// Arguments passed before the file path.
    #[serde(default)]
    pub args: Vec<String>,
    /// Seconds to wait before the call is abandoned.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Complete configuration of one organization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source_directories: Vec<PathBuf>,

    #[serde(default)]
    pub destination_directory: PathBuf,

    #[serde(default = "default_file_categories")]
    pub file_categories: BTreeMap<String, CategoryEntry>,

    /// Category for files whose extension is unmapped or absent.
    #[serde(default = "default_category")]
    pub default_category: String,

    #[serde(default = "default_summarize_extensions")]
    pub summarize_extensions: Vec<String>,

    #[serde(default)]
    pub organize_by_content: bool,

    /// Use the summarizer's suggested folder as a subfolder of the category.
    #[serde(default)]
    pub smart_rename: bool,

    /// Regexes matched against file names.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Globs matched against paths relative to the source root.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_max_summary_mb")]
    pub max_file_size_for_summary_mb: u64,

    /// Write `<stem>_summary.txt` next to each summarized file after moving it.
    #[serde(default)]
    pub create_summary_file: bool,

    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,

    #[serde(default)]
    pub summarizer: Option<SummarizerConfig>,

    /// Path the configuration was read from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_category() -> String {
    "Other".to_string()
}

fn default_max_summary_mb() -> u64 {
    10
}

fn default_summarize_extensions() -> Vec<String> {
    [".pdf", ".txt", ".docx"].iter().map(|s| s.to_string()).collect()
}

fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("logs")
}

fn default_file_categories() -> BTreeMap<String, CategoryEntry> {
    let table: [(&str, &[&str]); 8] = [
        ("Documents", &[".pdf", ".docx", ".doc", ".txt", ".rtf", ".odt", ".md"]),
        ("Images", &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".heic"]),
        ("Videos", &[".mp4", ".mov", ".avi", ".mkv", ".wmv", ".flv", ".webm"]),
        ("Audio", &[".mp3", ".wav", ".aac", ".flac", ".ogg", ".m4a"]),
        (
            "Code",
            &[".py", ".js", ".ts", ".html", ".css", ".java", ".cpp", ".c", ".go", ".rb", ".php", ".rs", ".sh"],
        ),
        ("Archives", &[".zip", ".rar", ".tar", ".gz", ".7z", ".xz", ".bz2"]),
        ("Presentations", &[".ppt", ".pptx", ".key", ".odp"]),
        ("Spreadsheets", &[".xls", ".xlsx", ".csv", ".numbers", ".ods"]),
    ];

    table
        .iter()
        .map(|(category, extensions)| {
            (
                category.to_string(),
                CategoryEntry::Extensions(extensions.iter().map(|e| e.to_string()).collect()),
            )
        })
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            source_directories: vec![home.join("Desktop"), home.join("Downloads")],
            destination_directory: home.join("Organized"),
            file_categories: default_file_categories(),
            default_category: default_category(),
            summarize_extensions: default_summarize_extensions(),
            organize_by_content: false,
            smart_rename: false,
            ignore_patterns: vec![
                r"^\.".to_string(),
                r"^~\$".to_string(),
                r"^Thumbs\.db$".to_string(),
                r"^desktop\.ini$".to_string(),
            ],
            exclude_patterns: Vec::new(),
            max_file_size_for_summary_mb: default_max_summary_mb(),
            create_summary_file: false,
            log_directory: default_log_directory(),
            summarizer: None,
            config_path: None,
        }
    }
}

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

impl Config {
    /// Load configuration, with fallback to a generated default.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `<config dir>/smartsort/config.json`
    /// 3. Write a default configuration there and use it
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or any file is invalid.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(&expand_tilde(path));
        }

        match Self::default_config_path() {
            Some(path) => Self::load_or_create(&path),
            None => Ok(Self::default()),
        }
    }

    /// The per-user configuration file location.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(DEFAULT_CONFIG_FILE))
    }

    /// Loads `path`, or writes the default configuration there first when it
    /// does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load_from_file(path);
        }

        let mut config = Self::default();
        config.write_to(path)?;
        tracing::info!(path = %path.display(), "Default configuration created");
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if parsing fails.
    /// Returns `ConfigError::Io` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&content, path)?;
        config.config_path = Some(path.to_path_buf());
        config.expand_paths();
        tracing::info!(path = %path.display(), "Configuration loaded from file");
        Ok(config)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let invalid = |reason: String| ConfigError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        };

        if is_toml {
            toml::from_str(content).map_err(|e| invalid(e.to_string()))
        } else {
            serde_json::from_str(content).map_err(|e| invalid(e.to_string()))
        }
    }

    /// Writes this configuration as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(io_err)
    }

    fn expand_paths(&mut self) {
        self.source_directories = self
            .source_directories
            .iter()
            .map(|p| expand_tilde(p))
            .collect();
        self.destination_directory = expand_tilde(&self.destination_directory);
        self.log_directory = expand_tilde(&self.log_directory);
    }

    /// Checks every field the organizer relies on.
    ///
    /// Called after command-line overrides are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_directories.is_empty() {
            return Err(ConfigError::MissingField("source_directories"));
        }
        if self.destination_directory.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("destination_directory"));
        }
        if self.default_category.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "default_category",
                reason: "category label is empty".to_string(),
            });
        }

        for (key, entry) in &self.file_categories {
            let empty_label = match entry {
                CategoryEntry::Category(label) => label.trim().is_empty(),
                CategoryEntry::Extensions(_) => key.trim().is_empty(),
            };
            if empty_label {
                return Err(ConfigError::InvalidValue {
                    field: "file_categories",
                    reason: format!("entry '{}' has an empty category label", key),
                });
            }
        }

        if self.organize_by_content {
            match &self.summarizer {
                None => {
                    return Err(ConfigError::InvalidValue {
                        field: "summarizer",
                        reason: "organize_by_content requires a summarizer command".to_string(),
                    });
                }
                Some(summarizer) if summarizer.command.trim().is_empty() => {
                    return Err(ConfigError::MissingField("summarizer.command"));
                }
                Some(summarizer) if summarizer.timeout_secs == 0 => {
                    return Err(ConfigError::InvalidValue {
                        field: "summarizer.timeout_secs",
                        reason: "timeout must be greater than zero".to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        self.compile_filters().map(|_| ())
    }

    /// Normalized extensions eligible for content summarization.
    pub fn summarizable_extensions(&self) -> HashSet<String> {
        self.summarize_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    /// Largest file size, in bytes, that is sent to the summarizer.
    pub fn max_summary_bytes(&self) -> u64 {
        self.max_file_size_for_summary_mb.saturating_mul(1024 * 1024)
    }

    /// Compile the exclusion rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.ignore_patterns, &self.exclude_patterns)
    }
}

/// Pre-compiled exclusion rules.
///
/// Regexes are searched in the bare file name; globs are matched against the
/// path relative to the source root.
#[derive(Debug)]
pub struct CompiledFilters {
    ignore_regexes: Vec<Regex>,
    exclude_patterns: Vec<Pattern>,
}

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl CompiledFilters {
    fn new(ignore_patterns: &[String], exclude_patterns: &[String]) -> Result<Self, ConfigError> {
        let ignore_regexes = ignore_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_patterns = exclude_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            ignore_regexes,
            exclude_patterns,
        })
    }

    /// Returns why a file is excluded, or `None` when it should be organized.
    pub fn exclusion_reason(&self, relative_path: &Path) -> Option<String> {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if let Some(regex) = self
            .ignore_regexes
            .iter()
            .find(|regex| regex.is_match(&file_name))
        {
            return Some(format!("matches ignore pattern '{}'", regex.as_str()));
        }

        self.exclude_patterns
            .iter()
            .find(|pattern| pattern.matches_path_with(relative_path, GLOB_OPTIONS))
            .map(|pattern| format!("matches exclude pattern '{}'", pattern.as_str()))
    }

    /// Whether a directory should not be descended into.
    pub fn excludes_dir(&self, relative_path: &Path) -> bool {
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path_with(relative_path, GLOB_OPTIONS))
    }
}
