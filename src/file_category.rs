//! Extension-based file categorization.
//!
//! The map is pure data: it is built from the `file_categories` table of the
//! configuration, so adding or renaming a category never needs a code change.
//!
//! # Examples
//!
//! ```
//! use smartsort::config::Config;
//! use smartsort::file_category::CategoryMap;
//! use std::path::Path;
//!
//! let map = CategoryMap::from_config(&Config::default());
//! assert_eq!(map.categorize(Path::new("report.PDF")).as_str(), "Documents");
//! assert_eq!(map.categorize(Path::new("notes")).as_str(), "Other");
//! ```
use crate::config::{CategoryEntry, Config};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

/// A category label such as `Documents` or `Images`.
///
/// The label doubles as the directory name under the destination root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the directory name for this category.
    pub fn dir_name(&self) -> &str {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes an extension for lookups: lowercase, no leading dot.
///
/// ```
/// use smartsort::file_category::normalize_extension;
///
/// assert_eq!(normalize_extension(".PDF"), "pdf");
/// assert_eq!(normalize_extension("jpg"), "jpg");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Returns the normalized extension of a path, if it has one.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
        .filter(|ext| !ext.is_empty())
}

/// Maps file extensions to categories.
#[derive(Debug, Clone)]
pub struct CategoryMap {
    extension_map: HashMap<String, Category>,
    default_category: Category,
}

impl CategoryMap {
    /// Builds the map from the configuration's category table.
    pub fn from_config(config: &Config) -> Self {
        Self::from_entries(&config.file_categories, &config.default_category)
    }

    /// Builds the map from raw table entries.
    ///
    /// Entries are visited in sorted key order and the first claim on an
    /// extension wins.
    pub fn from_entries(entries: &BTreeMap<String, CategoryEntry>, default_category: &str) -> Self {
        let mut map = Self {
            extension_map: HashMap::new(),
            default_category: Category::new(default_category),
        };

        for (key, entry) in entries {
            match entry {
                CategoryEntry::Category(label) => map.add_extension_mapping(key, Category::new(label)),
                CategoryEntry::Extensions(extensions) => {
                    for ext in extensions {
                        map.add_extension_mapping(ext, Category::new(key));
                    }
                }
            }
        }

        map
    }

    /// Adds a mapping unless the extension is already claimed.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        let ext = normalize_extension(ext);
        if ext.is_empty() {
            return;
        }
        if let Some(existing) = self.extension_map.get(&ext) {
            if *existing != category {
                tracing::warn!(extension = %ext, kept = %existing, ignored = %category, "Extension mapped twice");
            }
            return;
        }
        self.extension_map.insert(ext, category);
    }

    /// Maps a file extension to a category.
    pub fn extension_to_category(&self, ext: &str) -> Option<&Category> {
        self.extension_map.get(&normalize_extension(ext))
    }

    /// Determines the category of a file from its extension, falling back to
    /// the default category.
    pub fn categorize(&self, path: &Path) -> Category {
        extension_of(path)
            .and_then(|ext| self.extension_to_category(&ext).cloned())
            .unwrap_or_else(|| self.default_category.clone())
    }
}
