//! Point-in-time content snapshots of a directory tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One hashed file inside a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Relative, forward-slash key (`commands/review.md`)
    pub path: String,
    /// Lowercase hex SHA-256 of the content
    pub hash: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time, when the platform reports one
    pub mtime: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, hash: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            size,
            mtime: None,
        }
    }
}

/// Map of relative path to [`FileRecord`] for one tree.
///
/// Snapshots are immutable once built. The map is ordered so that iteration,
/// serialization and anything derived from a snapshot are deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    root: PathBuf,
    files: BTreeMap<String, FileRecord>,
    taken_at: DateTime<Utc>,
    warnings: Vec<String>,
    /// Keys of files or directories that exist but could not be read
    #[serde(default)]
    unreadable: BTreeSet<String>,
}

impl Snapshot {
    /// Build a snapshot from records. Later records win on duplicate paths.
    pub fn new(
        root: impl Into<PathBuf>,
        records: impl IntoIterator<Item = FileRecord>,
        warnings: Vec<String>,
    ) -> Self {
        let files = records
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();
        Self {
            root: root.into(),
            files,
            taken_at: Utc::now(),
            warnings,
            unreadable: BTreeSet::new(),
        }
    }

    /// Record keys that exist in the tree but could not be read.
    ///
    /// A directory key covers everything below it.
    pub fn with_unreadable(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.unreadable.extend(keys);
        self
    }

    /// A snapshot of a tree with no files.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Vec::new(), Vec::new())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &BTreeMap<String, FileRecord> {
        &self.files
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Non-fatal problems met while building the snapshot (unreadable files).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn unreadable(&self) -> &BTreeSet<String> {
        &self.unreadable
    }

    /// Whether `path` (or a directory above it) was present but unreadable.
    ///
    /// Such a path has unknown content, which is different from being absent.
    pub fn is_unreadable(&self, path: &str) -> bool {
        self.unreadable.iter().any(|key| {
            path == key
                || (path.len() > key.len()
                    && path.starts_with(key.as_str())
                    && path.as_bytes()[key.len()] == b'/')
        })
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn hash_of(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|r| r.hash.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Project to the `path -> hash` form stored in baselines.
    pub fn hashes(&self) -> BTreeMap<String, String> {
        self.files
            .iter()
            .map(|(path, record)| (path.clone(), record.hash.clone()))
            .collect()
    }

    /// Total size in bytes of every file in the snapshot.
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|r| r.size).sum()
    }

    /// A copy holding only the records whose path passes `keep`.
    pub fn restrict(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        Self {
            root: self.root.clone(),
            files: self
                .files
                .iter()
                .filter(|(path, _)| keep(path.as_str()))
                .map(|(path, record)| (path.clone(), record.clone()))
                .collect(),
            taken_at: self.taken_at,
            warnings: self.warnings.clone(),
            unreadable: self.unreadable.clone(),
        }
    }
}
