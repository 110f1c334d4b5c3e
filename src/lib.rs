//! smartsort - sort files into category folders
//!
//! This library walks source directories, assigns each file a category from
//! its extension, optionally refines the destination with a folder name
//! suggested by an external content summarizer, and moves the file without
//! ever overwriting an existing one. Every decision is recorded in an
//! append-only activity log and summarized at the end of the run.

pub mod cli;
pub mod config;
pub mod file_category;
pub mod file_organizer;
pub mod output;
pub mod report;
pub mod summarizer;

pub use config::{CompiledFilters, Config, ConfigError};
pub use file_category::{Category, CategoryMap};
pub use file_organizer::{FileOrganizer, OrganizeError, Organizer};
pub use report::{ActivityLog, FileRecord, Outcome, RunReport};
pub use summarizer::{CommandSummarizer, Summarization, Summarizer};

pub use cli::{Cli, run_cli};
