/// The organization engine.
///
/// [`Organizer::run`] walks every configured source directory, classifies
/// each file, optionally asks the summarizer for a content-based subfolder,
/// plans a collision-free destination and moves the file (or only records the
/// plan in dry-run mode). Per-file problems become [`Outcome::Failed`]
/// records; they never stop the run.
use crate::config::{CompiledFilters, Config, ConfigError};
use crate::file_category::{Category, CategoryMap, extension_of};
use crate::report::{ActivityLog, FileRecord, Outcome, RunReport};
use crate::summarizer::{Summarization, Summarizer};
use chrono::Local;
use indicatif::ProgressBar;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Upper bound on numeric suffixes tried when resolving name collisions.
pub const MAX_COLLISION_SUFFIX: usize = 10_000;

const BUFFER_SIZE: usize = 8192;

/// Errors that can occur during file organization operations.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// Failed to create a destination directory.
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to move a file to its destination.
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A cross-device copy did not match its source.
    #[error("Copy of {} to {} did not match the original", .from.display(), .to.display())]
    VerificationFailed { from: PathBuf, to: PathBuf },
    /// No free name was found for the file.
    #[error("No free name for {} after {attempts} attempts", .path.display())]
    CollisionExhausted { path: PathBuf, attempts: usize },
    /// The path has no final component to keep.
    #[error("{} has no file name", .0.display())]
    MissingFileName(PathBuf),
    /// Failed to write the summary sidecar file.
    #[error("Failed to write summary file {}: {source}", .path.display())]
    SummaryWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// None of the configured source directories could be read.
    #[error("No usable source directory: {0}")]
    NoUsableSource(String),
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Filesystem primitives used by the organizer.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Picks a destination for `file_name` inside `dir` that neither exists on
    /// disk nor was already handed out in this run.
    ///
    /// The first candidate is the original name; after that a numeric suffix
    /// is inserted before the extension (`report_1.pdf`, `report_2.pdf`, ...).
    ///
    /// # Examples
    ///
    /// ```
    /// use smartsort::file_organizer::FileOrganizer;
    /// use std::collections::HashSet;
    /// use std::ffi::OsStr;
    /// use std::path::{Path, PathBuf};
    ///
    /// let mut reserved = HashSet::new();
    /// reserved.insert(PathBuf::from("/no/such/dir/report.pdf"));
    /// let path = FileOrganizer::unique_destination(
    ///     Path::new("/no/such/dir"),
    ///     OsStr::new("report.pdf"),
    ///     &reserved,
    /// )
    /// .unwrap();
    /// assert_eq!(path, Path::new("/no/such/dir/report_1.pdf"));
    /// ```
    pub fn unique_destination(
        dir: &Path,
        file_name: &OsStr,
        reserved: &HashSet<PathBuf>,
    ) -> OrganizeResult<PathBuf> {
        let is_free = |candidate: &Path| {
            !reserved.contains(candidate) && fs::symlink_metadata(candidate).is_err()
        };

        let candidate = dir.join(file_name);
        if is_free(&candidate) {
            return Ok(candidate);
        }

        let original = Path::new(file_name);
        let stem = original.file_stem().unwrap_or(file_name);
        let extension = original.extension();

        for n in 1..=MAX_COLLISION_SUFFIX {
            let mut name = OsString::from(stem);
            name.push(format!("_{}", n));
            if let Some(ext) = extension {
                name.push(".");
                name.push(ext);
            }
            let candidate = dir.join(name);
            if is_free(&candidate) {
                return Ok(candidate);
            }
        }

        Err(OrganizeError::CollisionExhausted {
            path: candidate,
            attempts: MAX_COLLISION_SUFFIX,
        })
    }

    /// Moves `from` to `to`, creating the destination directory as needed.
    ///
    /// A plain rename is tried first. When the rename fails because the two
    /// paths live on different devices the file is copied, verified and only
    /// then is the source removed.
    pub fn move_file(from: &Path, to: &Path) -> OrganizeResult<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|source| OrganizeError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                tracing::debug!(from = %from.display(), to = %to.display(), "Rename crosses devices, copying");
                Self::copy_across_devices(from, to)
            }
            Err(source) => Err(OrganizeError::FileMoveFailure {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            }),
        }
    }

    /// Copy-verify-delete move.
    ///
    /// The copy is written to a hidden temporary name next to the
    /// destination and renamed into place only after its checksum matches.
    /// On any failure the partial copy is removed; if the source cannot be
    /// deleted the new copy is removed again so no duplicate remains.
    pub(crate) fn copy_across_devices(from: &Path, to: &Path) -> OrganizeResult<()> {
        let move_err = |source: io::Error| OrganizeError::FileMoveFailure {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        };

        let file_name = to
            .file_name()
            .ok_or_else(|| OrganizeError::MissingFileName(to.to_path_buf()))?;
        let mut temp_name = OsString::from(".");
        temp_name.push(file_name);
        temp_name.push(".smartsort-partial");
        let temp = to.with_file_name(temp_name);

        if let Err(e) = fs::copy(from, &temp) {
            let _ = fs::remove_file(&temp);
            return Err(move_err(e));
        }

        let verified = match (file_checksum(from), file_checksum(&temp)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !verified {
            let _ = fs::remove_file(&temp);
            return Err(OrganizeError::VerificationFailed {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            });
        }

        if let Err(e) = fs::rename(&temp, to) {
            let _ = fs::remove_file(&temp);
            return Err(move_err(e));
        }

        if let Err(e) = fs::remove_file(from) {
            let _ = fs::remove_file(to);
            return Err(move_err(e));
        }

        Ok(())
    }

    /// Writes `<stem>_summary.txt` beside a moved file.
    pub fn write_summary_file(
        moved_file: &Path,
        summary: &str,
        reserved: &HashSet<PathBuf>,
    ) -> OrganizeResult<PathBuf> {
        let dir = moved_file
            .parent()
            .ok_or_else(|| OrganizeError::MissingFileName(moved_file.to_path_buf()))?;
        let file_name = moved_file
            .file_name()
            .ok_or_else(|| OrganizeError::MissingFileName(moved_file.to_path_buf()))?;
        let stem = Path::new(file_name).file_stem().unwrap_or(file_name);

        let mut summary_name = OsString::from(stem);
        summary_name.push("_summary.txt");
        let path = Self::unique_destination(dir, &summary_name, reserved)?;

        let write_err = |source| OrganizeError::SummaryWriteFailed {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(write_err)?;
        write!(
            file,
            "Summary of {}:\n\n{}\n\nOrganized on: {}\n",
            file_name.to_string_lossy(),
            summary,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )
        .map_err(write_err)?;

        Ok(path)
    }
}

/// SHA-256 of a file's content.
fn file_checksum(path: &Path) -> io::Result<Vec<u8>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_vec())
}

/// Canonical form of a path that may not exist yet.
fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name())
        && let Ok(parent) = fs::canonicalize(parent)
    {
        return parent.join(name);
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// One entry found while walking a source directory.
enum Discovered {
    File(PathBuf),
    Skipped(PathBuf, String),
    Unreadable(PathBuf, String),
}

/// Walks the configured sources and organizes every eligible file.
pub struct Organizer<'a> {
    config: &'a Config,
    summarizer: &'a dyn Summarizer,
    category_map: CategoryMap,
    filters: CompiledFilters,
    summarizable: HashSet<String>,
    destination_root: PathBuf,
    /// The tool's own directories and files, never organized.
    protected: Vec<PathBuf>,
    progress: Option<ProgressBar>,
}

impl<'a> Organizer<'a> {
    /// Prepares an organizer for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the exclusion patterns do not compile.
    pub fn new(config: &'a Config, summarizer: &'a dyn Summarizer) -> Result<Self, ConfigError> {
        let destination_root = resolve_path(&config.destination_directory);
        let mut protected = vec![destination_root.clone(), resolve_path(&config.log_directory)];
        if let Some(config_path) = &config.config_path {
            protected.push(resolve_path(config_path));
        }

        Ok(Self {
            config,
            summarizer,
            category_map: CategoryMap::from_config(config),
            filters: config.compile_filters()?,
            summarizable: config.summarizable_extensions(),
            destination_root,
            protected,
            progress: None,
        })
    }

    /// Reports progress on `progress` while running.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Organizes every configured source directory.
    ///
    /// Unavailable sources are recorded and skipped. When `activity` is given,
    /// one entry per file outcome plus a closing run summary is appended to it.
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::NoUsableSource` only when every configured
    /// source is unavailable; all per-file problems are part of the report.
    pub fn run(&self, dry_run: bool, mut activity: Option<&mut ActivityLog>) -> OrganizeResult<RunReport> {
        let mut report = RunReport::new(dry_run);
        let mut reserved = HashSet::new();

        tracing::info!(
            sources = self.config.source_directories.len(),
            destination = %self.destination_root.display(),
            dry_run,
            "Starting organization run"
        );

        for source in &self.config.source_directories {
            let root = match Self::open_source(source) {
                Ok(root) => root,
                Err(reason) => {
                    tracing::warn!(source = %source.display(), %reason, "Source directory unavailable");
                    if let Some(log) = activity.as_deref_mut()
                        && let Err(e) = log.record_source_unavailable(source, &reason)
                    {
                        tracing::error!(error = %e, "Could not write activity log");
                    }
                    report.push_source_error(source.clone(), reason);
                    continue;
                }
            };

            tracing::info!(source = %root.display(), "Processing directory");
            let entries = self.discover(&root);
            if let Some(pb) = &self.progress {
                pb.inc_length(entries.len() as u64);
            }

            for entry in entries {
                let record = self.process(&root, entry, dry_run, &mut reserved);

                if let Some(log) = activity.as_deref_mut()
                    && let Err(e) = log.record_file(&record, dry_run)
                {
                    tracing::error!(error = %e, "Could not write activity log");
                }
                if let Some(pb) = &self.progress {
                    pb.inc(1);
                }
                report.push(record);
            }
        }

        if report.source_errors().len() == self.config.source_directories.len() {
            let reasons = report
                .source_errors()
                .iter()
                .map(|e| format!("{} ({})", e.path.display(), e.reason))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(OrganizeError::NoUsableSource(reasons));
        }

        let report = report.finish();
        if let Some(log) = activity.as_deref_mut()
            && let Err(e) = log.record_run_summary(&report)
        {
            tracing::error!(error = %e, "Could not write activity log");
        }

        let totals = report.totals();
        tracing::info!(
            scanned = totals.scanned,
            moved = totals.moved,
            would_move = totals.would_move,
            skipped = totals.skipped,
            failed = totals.failed,
            "Organization run finished"
        );

        Ok(report)
    }

    /// Checks that a source is a readable directory and returns its
    /// canonical path.
    fn open_source(source: &Path) -> Result<PathBuf, String> {
        let metadata = fs::metadata(source).map_err(|e| e.to_string())?;
        if !metadata.is_dir() {
            return Err("not a directory".to_string());
        }
        fs::read_dir(source).map_err(|e| e.to_string())?;
        fs::canonicalize(source).map_err(|e| e.to_string())
    }

    fn is_protected(&self, path: &Path) -> bool {
        self.protected.iter().any(|p| p == path)
    }

    /// Folders directly under the destination root hold organized output,
    /// even when a source is the destination itself.
    fn is_output_dir(&self, path: &Path) -> bool {
        path.parent() == Some(self.destination_root.as_path())
    }

    /// Lists the files of one source in a deterministic order.
    fn discover(&self, root: &Path) -> Vec<Discovered> {
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                !self.is_protected(entry.path())
                    && !self.is_output_dir(entry.path())
                    && !self.filters.excludes_dir(relative)
            });

        let mut found = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    found.push(Discovered::Unreadable(path, e.to_string()));
                    continue;
                }
            };

            let path = entry.path();
            let file_type = entry.file_type();
            if file_type.is_dir() || self.is_protected(path) {
                continue;
            }

            if file_type.is_symlink() {
                match fs::canonicalize(path) {
                    Err(_) => found.push(Discovered::Skipped(
                        path.to_path_buf(),
                        "dangling symbolic link".to_string(),
                    )),
                    Ok(target) if !target.starts_with(root) => found.push(Discovered::Skipped(
                        path.to_path_buf(),
                        "symbolic link points outside the source tree".to_string(),
                    )),
                    Ok(target) if target.is_dir() => {}
                    Ok(_) => found.push(Discovered::File(path.to_path_buf())),
                }
                continue;
            }

            found.push(Discovered::File(path.to_path_buf()));
        }

        found
    }

    fn base_record(&self, path: &Path) -> FileRecord {
        FileRecord {
            source: path.to_path_buf(),
            extension: extension_of(path),
            size: fs::metadata(path).ok().map(|m| m.len()),
            category: self.category_map.categorize(path),
            summary: None,
            suggested_folder: None,
            destination: None,
            outcome: Outcome::WouldMove,
        }
    }

    fn process(
        &self,
        root: &Path,
        entry: Discovered,
        dry_run: bool,
        reserved: &mut HashSet<PathBuf>,
    ) -> FileRecord {
        let path = match entry {
            Discovered::File(path) => path,
            Discovered::Skipped(path, reason) => {
                tracing::debug!(path = %path.display(), %reason, "Skipping entry");
                return FileRecord {
                    outcome: Outcome::Skipped { reason },
                    ..self.base_record(&path)
                };
            }
            Discovered::Unreadable(path, reason) => {
                tracing::warn!(path = %path.display(), %reason, "Could not read entry");
                return FileRecord {
                    outcome: Outcome::Failed { reason },
                    ..self.base_record(&path)
                };
            }
        };

        let mut record = self.base_record(&path);

        let relative = path.strip_prefix(root).unwrap_or(&path);
        if let Some(reason) = self.filters.exclusion_reason(relative) {
            tracing::debug!(path = %path.display(), %reason, "Ignoring file");
            record.outcome = Outcome::Skipped { reason };
            return record;
        }

        if let Some(summary) = self.summarize_if_eligible(&record) {
            record.suggested_folder = summary.1.filter(|_| self.config.smart_rename);
            record.summary = Some(summary.0);
        }

        let target_dir = self.target_dir(&record.category, record.suggested_folder.as_deref());
        if path.parent() == Some(target_dir.as_path()) {
            tracing::debug!(path = %path.display(), "Already in its destination folder");
            record.outcome = Outcome::Skipped {
                reason: "already in its destination folder".to_string(),
            };
            return record;
        }

        let destination = match path.file_name() {
            Some(name) => FileOrganizer::unique_destination(&target_dir, name, reserved),
            None => Err(OrganizeError::MissingFileName(path.clone())),
        };
        let destination = match destination {
            Ok(destination) => destination,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not plan destination");
                record.outcome = Outcome::Failed { reason: e.to_string() };
                return record;
            }
        };
        reserved.insert(destination.clone());
        record.destination = Some(destination.clone());

        if dry_run {
            tracing::info!(from = %path.display(), to = %destination.display(), "Would move");
            record.outcome = Outcome::WouldMove;
            return record;
        }

        match FileOrganizer::move_file(&path, &destination) {
            Ok(()) => {
                tracing::info!(from = %path.display(), to = %destination.display(), "Organized");
                record.outcome = Outcome::Moved;
                self.write_summary_sidecar(&record, &destination, reserved);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to organize file");
                record.outcome = Outcome::Failed { reason: e.to_string() };
            }
        }

        record
    }

    fn target_dir(&self, category: &Category, folder: Option<&str>) -> PathBuf {
        let dir = self.destination_root.join(category.dir_name());
        match folder {
            Some(folder) => dir.join(folder),
            None => dir,
        }
    }

    /// Asks the summarizer about a file when content organization applies.
    ///
    /// Returns the summary text and the suggested folder, if any.
    fn summarize_if_eligible(&self, record: &FileRecord) -> Option<(String, Option<String>)> {
        if !self.config.organize_by_content {
            return None;
        }
        let extension = record.extension.as_deref()?;
        if !self.summarizable.contains(extension) {
            return None;
        }

        match record.size {
            None => {
                tracing::debug!(path = %record.source.display(), "Unreadable metadata, not summarizing");
                return None;
            }
            Some(0) => return None,
            Some(size) if size > self.config.max_summary_bytes() => {
                tracing::info!(path = %record.source.display(), size, "File too large to summarize");
                return None;
            }
            Some(_) => {}
        }

        match self.summarizer.summarize(&record.source) {
            Summarization::Summary(summary) => Some((summary.summary, summary.folder)),
            Summarization::Unavailable(reason) => {
                tracing::debug!(path = %record.source.display(), %reason, "Falling back to extension category");
                None
            }
        }
    }

    fn write_summary_sidecar(&self, record: &FileRecord, destination: &Path, reserved: &mut HashSet<PathBuf>) {
        if !self.config.create_summary_file {
            return;
        }
        let Some(summary) = &record.summary else {
            return;
        };

        match FileOrganizer::write_summary_file(destination, summary, reserved) {
            Ok(path) => {
                reserved.insert(path);
            }
            Err(e) => tracing::warn!(error = %e, "Could not write summary file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryEntry;
    use crate::summarizer::{ContentSummary, DisabledSummarizer};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct FixedSummarizer(&'static str);

    impl Summarizer for FixedSummarizer {
        fn summarize(&self, _path: &Path) -> Summarization {
            Summarization::Summary(ContentSummary {
                summary: "quarterly figures".to_string(),
                folder: Some(self.0.to_string()),
            })
        }
    }

    fn config_for(temp: &TempDir) -> Config {
        let mut categories = BTreeMap::new();
        categories.insert("pdf".to_string(), CategoryEntry::Category("Documents".to_string()));
        categories.insert("jpg".to_string(), CategoryEntry::Category("Images".to_string()));
        categories.insert("txt".to_string(), CategoryEntry::Category("Documents".to_string()));

        Config {
            source_directories: vec![temp.path().join("in")],
            destination_directory: temp.path().join("out"),
            file_categories: categories,
            ignore_patterns: Vec::new(),
            log_directory: temp.path().join("logs"),
            ..Config::default()
        }
    }

    #[test]
    fn test_unique_destination_appends_suffix() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("report.pdf"), "a").unwrap();
        fs::write(temp.path().join("report_1.pdf"), "b").unwrap();

        let path =
            FileOrganizer::unique_destination(temp.path(), OsStr::new("report.pdf"), &HashSet::new())
                .unwrap();
        assert_eq!(path, temp.path().join("report_2.pdf"));
    }

    #[test]
    fn test_unique_destination_without_extension() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Makefile"), "a").unwrap();

        let path =
            FileOrganizer::unique_destination(temp.path(), OsStr::new("Makefile"), &HashSet::new())
                .unwrap();
        assert_eq!(path, temp.path().join("Makefile_1"));
    }

    #[test]
    fn test_move_file_creates_directories() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("a.txt");
        fs::write(&from, "content").unwrap();
        let to = temp.path().join("x").join("y").join("a.txt");

        FileOrganizer::move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "content");
    }

    #[test]
    fn test_move_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let result = FileOrganizer::move_file(&temp.path().join("gone.txt"), &temp.path().join("d/gone.txt"));
        assert!(matches!(result, Err(OrganizeError::FileMoveFailure { .. })));
    }

    #[test]
    fn test_copy_across_devices_leaves_single_copy() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("photo.jpg");
        fs::write(&from, vec![7u8; 20_000]).unwrap();
        fs::create_dir(temp.path().join("dest")).unwrap();
        let to = temp.path().join("dest").join("photo.jpg");

        FileOrganizer::copy_across_devices(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), vec![7u8; 20_000]);
        let leftovers: Vec<_> = fs::read_dir(temp.path().join("dest")).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_copy_across_devices_missing_source_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("dest")).unwrap();
        let to = temp.path().join("dest").join("a.txt");

        let result = FileOrganizer::copy_across_devices(&temp.path().join("a.txt"), &to);

        assert!(result.is_err());
        assert_eq!(fs::read_dir(temp.path().join("dest")).unwrap().count(), 0);
    }

    #[test]
    fn test_write_summary_file() {
        let temp = TempDir::new().unwrap();
        let moved = temp.path().join("report.pdf");
        fs::write(&moved, "pdf").unwrap();

        let path = FileOrganizer::write_summary_file(&moved, "A short summary", &HashSet::new()).unwrap();

        assert_eq!(path, temp.path().join("report_summary.txt"));
        let body = fs::read_to_string(path).unwrap();
        assert!(body.starts_with("Summary of report.pdf:"));
        assert!(body.contains("A short summary"));
    }

    #[test]
    fn test_run_dry_run_plans_without_moving() {
        let temp = TempDir::new().unwrap();
        let config = config_for(&temp);
        fs::create_dir(temp.path().join("in")).unwrap();
        fs::write(temp.path().join("in").join("a.pdf"), "x").unwrap();

        let organizer = Organizer::new(&config, &DisabledSummarizer).unwrap();
        let report = organizer.run(true, None).unwrap();

        assert_eq!(report.totals().would_move, 1);
        assert!(temp.path().join("in").join("a.pdf").exists());
        assert!(!temp.path().join("out").exists());
        let destination = report.records()[0].destination.clone().unwrap();
        assert!(destination.ends_with("out/Documents/a.pdf"));
    }

    #[test]
    fn test_dry_run_reserves_names_across_sources() {
        let temp = TempDir::new().unwrap();
        let mut config = config_for(&temp);
        config.source_directories.push(temp.path().join("in2"));
        for dir in ["in", "in2"] {
            fs::create_dir(temp.path().join(dir)).unwrap();
            fs::write(temp.path().join(dir).join("same.pdf"), dir).unwrap();
        }

        let organizer = Organizer::new(&config, &DisabledSummarizer).unwrap();
        let report = organizer.run(true, None).unwrap();

        let destinations: Vec<_> = report
            .records()
            .iter()
            .map(|r| r.destination.clone().unwrap())
            .collect();
        assert_eq!(destinations.len(), 2);
        assert_ne!(destinations[0], destinations[1]);
        assert!(destinations[1].ends_with("Documents/same_1.pdf"));
    }

    #[test]
    fn test_smart_rename_uses_suggested_folder() {
        let temp = TempDir::new().unwrap();
        let mut config = config_for(&temp);
        config.organize_by_content = true;
        config.smart_rename = true;
        fs::create_dir(temp.path().join("in")).unwrap();
        fs::write(temp.path().join("in").join("q3.txt"), "numbers").unwrap();

        let summarizer = FixedSummarizer("Project Reports");
        let organizer = Organizer::new(&config, &summarizer).unwrap();
        let report = organizer.run(false, None).unwrap();

        assert_eq!(report.totals().moved, 1);
        assert!(temp.path().join("out/Documents/Project Reports/q3.txt").exists());
        assert_eq!(report.records()[0].summary.as_deref(), Some("quarterly figures"));
    }

    #[test]
    fn test_summary_without_smart_rename_keeps_category_folder() {
        let temp = TempDir::new().unwrap();
        let mut config = config_for(&temp);
        config.organize_by_content = true;
        fs::create_dir(temp.path().join("in")).unwrap();
        fs::write(temp.path().join("in").join("q3.txt"), "numbers").unwrap();

        let summarizer = FixedSummarizer("Project Reports");
        let organizer = Organizer::new(&config, &summarizer).unwrap();
        let report = organizer.run(false, None).unwrap();

        assert!(temp.path().join("out/Documents/q3.txt").exists());
        assert_eq!(report.records()[0].suggested_folder, None);
        assert_eq!(report.files_summarized(), 1);
    }

    #[test]
    fn test_zero_byte_file_is_not_summarized() {
        let temp = TempDir::new().unwrap();
        let mut config = config_for(&temp);
        config.organize_by_content = true;
        config.smart_rename = true;
        fs::create_dir(temp.path().join("in")).unwrap();
        fs::write(temp.path().join("in").join("empty.txt"), "").unwrap();

        let summarizer = FixedSummarizer("Never");
        let organizer = Organizer::new(&config, &summarizer).unwrap();
        let report = organizer.run(false, None).unwrap();

        assert!(temp.path().join("out/Documents/empty.txt").exists());
        assert_eq!(report.records()[0].summary, None);
    }

    #[test]
    fn test_all_sources_missing_is_fatal() {
        let temp = TempDir::new().unwrap();
        let config = config_for(&temp);

        let organizer = Organizer::new(&config, &DisabledSummarizer).unwrap();
        let result = organizer.run(false, None);

        assert!(matches!(result, Err(OrganizeError::NoUsableSource(_))));
    }

    #[test]
    fn test_destination_inside_source_is_not_ingested() {
        let temp = TempDir::new().unwrap();
        let mut config = config_for(&temp);
        config.destination_directory = temp.path().join("in").join("sorted");
        fs::create_dir_all(temp.path().join("in/sorted/Documents")).unwrap();
        fs::write(temp.path().join("in/sorted/Documents/old.pdf"), "old").unwrap();
        fs::write(temp.path().join("in/new.pdf"), "new").unwrap();

        let organizer = Organizer::new(&config, &DisabledSummarizer).unwrap();
        let report = organizer.run(false, None).unwrap();

        assert_eq!(report.records().len(), 1);
        assert!(temp.path().join("in/sorted/Documents/old.pdf").exists());
        assert!(temp.path().join("in/sorted/Documents/new.pdf").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_outside_tree_is_skipped() {
        let temp = TempDir::new().unwrap();
        let config = config_for(&temp);
        fs::create_dir(temp.path().join("in")).unwrap();
        fs::write(temp.path().join("secret.pdf"), "s").unwrap();
        std::os::unix::fs::symlink(temp.path().join("secret.pdf"), temp.path().join("in/link.pdf")).unwrap();

        let organizer = Organizer::new(&config, &DisabledSummarizer).unwrap();
        let report = organizer.run(false, None).unwrap();

        assert_eq!(report.totals().skipped, 1);
        assert!(temp.path().join("in/link.pdf").symlink_metadata().is_ok());
        assert!(temp.path().join("secret.pdf").exists());
    }

    #[test]
    fn test_in_place_organize_is_stable_across_runs() {
        let temp = TempDir::new().unwrap();
        let mut config = config_for(&temp);
        config.destination_directory = temp.path().join("in");
        fs::create_dir(temp.path().join("in")).unwrap();
        fs::write(temp.path().join("in/report.pdf"), "pdf").unwrap();

        let organizer = Organizer::new(&config, &DisabledSummarizer).unwrap();
        assert_eq!(organizer.run(false, None).unwrap().totals().moved, 1);

        for _ in 0..2 {
            let report = organizer.run(false, None).unwrap();
            assert_eq!(report.totals().scanned, 0);
        }

        let names: Vec<_> = fs::read_dir(temp.path().join("in/Documents"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![OsString::from("report.pdf")]);
    }

    #[test]
    fn test_file_already_in_target_folder_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let mut config = config_for(&temp);
        config.source_directories = vec![temp.path().join("out/Documents")];
        fs::create_dir_all(temp.path().join("out/Documents")).unwrap();
        fs::write(temp.path().join("out/Documents/a.pdf"), "a").unwrap();

        let organizer = Organizer::new(&config, &DisabledSummarizer).unwrap();
        let report = organizer.run(false, None).unwrap();

        assert_eq!(report.totals().skipped, 1);
        assert_eq!(report.totals().moved, 0);
        assert!(temp.path().join("out/Documents/a.pdf").exists());
        assert!(!temp.path().join("out/Documents/a_1.pdf").exists());
    }

    #[test]
    fn test_blocked_category_folder_fails_only_that_file() {
        let temp = TempDir::new().unwrap();
        let config = config_for(&temp);
        fs::create_dir(temp.path().join("in")).unwrap();
        fs::write(temp.path().join("in/a.pdf"), "a").unwrap();
        fs::write(temp.path().join("in/b.jpg"), "b").unwrap();
        fs::create_dir(temp.path().join("out")).unwrap();
        fs::write(temp.path().join("out/Documents"), "not a directory").unwrap();

        let organizer = Organizer::new(&config, &DisabledSummarizer).unwrap();
        let report = organizer.run(false, None).unwrap();

        let totals = report.totals();
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.moved, 1);
        let (path, reason) = report.failures().next().unwrap();
        assert!(path.ends_with("a.pdf"));
        assert!(reason.contains("Failed to create directory"));
        assert!(temp.path().join("in/a.pdf").exists());
        assert!(temp.path().join("out/Images/b.jpg").exists());
    }

    #[test]
    fn test_source_vanishing_before_move_is_failed() {
        let temp = TempDir::new().unwrap();
        let config = config_for(&temp);
        fs::create_dir(temp.path().join("in")).unwrap();
        let root = fs::canonicalize(temp.path().join("in")).unwrap();

        let organizer = Organizer::new(&config, &DisabledSummarizer).unwrap();
        let record = organizer.process(
            &root,
            Discovered::File(root.join("gone.pdf")),
            false,
            &mut HashSet::new(),
        );

        assert!(matches!(record.outcome, Outcome::Failed { .. }));
        assert_eq!(record.size, None);
        assert_eq!(record.category.as_str(), "Documents");
    }

    #[test]
    fn test_unreadable_entry_is_recorded_as_failed() {
        let temp = TempDir::new().unwrap();
        let config = config_for(&temp);
        let root = temp.path().join("in");

        let organizer = Organizer::new(&config, &DisabledSummarizer).unwrap();
        let record = organizer.process(
            &root,
            Discovered::Unreadable(root.join("locked"), "permission denied".to_string()),
            false,
            &mut HashSet::new(),
        );

        assert_eq!(
            record.outcome,
            Outcome::Failed {
                reason: "permission denied".to_string()
            }
        );
        assert_eq!(record.destination, None);
    }

    #[test]
    fn test_summary_file_write_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let moved = temp.path().join("missing_dir").join("report.pdf");

        let result = FileOrganizer::write_summary_file(&moved, "text", &HashSet::new());

        assert!(matches!(result, Err(OrganizeError::SummaryWriteFailed { .. })));
    }

    #[test]
    fn test_failed_sidecar_does_not_reserve_a_name() {
        let temp = TempDir::new().unwrap();
        let mut config = config_for(&temp);
        config.create_summary_file = true;
        let organizer = Organizer::new(&config, &DisabledSummarizer).unwrap();

        let mut record = organizer.base_record(&temp.path().join("report.pdf"));
        record.summary = Some("text".to_string());
        let destination = temp.path().join("missing_dir").join("report.pdf");
        let mut reserved = HashSet::new();

        organizer.write_summary_sidecar(&record, &destination, &mut reserved);

        assert!(reserved.is_empty());
        assert!(!temp.path().join("missing_dir").exists());
    }
}
