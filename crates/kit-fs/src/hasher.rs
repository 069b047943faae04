//! Directory walking and parallel content hashing.
//!
//! [`FileHasher::snapshot`] enumerates a tree with `walkdir`, prunes ignored
//! entries, then hashes the remaining files on a bounded pool of scoped
//! threads. The resulting [`Snapshot`] does not depend on worker scheduling.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::checksum::compute_file_checksum;
use crate::constants::META_DIR;
use crate::path::relative_key;
use crate::snapshot::{FileRecord, Snapshot};
use crate::{Error, Result};

/// Patterns used when no configuration overrides them.
pub const DEFAULT_IGNORE: &[&str] = &[
    ".git",
    "node_modules",
    "*.log",
    ".DS_Store",
    "__pycache__",
    "*.pyc",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled set of glob-style ignore patterns.
///
/// A pattern without `/` is matched against every path component, so `.git`
/// or `*.log` apply at any depth. A pattern containing `/` is matched against
/// the relative path and each of its ancestor directories, so `docs/drafts`
/// hides everything below that directory. The metadata directory is always
/// ignored.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    component: Vec<Pattern>,
    full: Vec<Pattern>,
}

impl IgnoreSet {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self {
            component: Vec::new(),
            full: Vec::new(),
        };
        set.push(META_DIR)?;
        for pattern in patterns {
            set.push(pattern.as_ref())?;
        }
        Ok(set)
    }

    /// The built-in defaults (see [`DEFAULT_IGNORE`]).
    pub fn defaults() -> Self {
        // The default patterns are static and known to compile
        Self::new(DEFAULT_IGNORE).unwrap_or(Self {
            component: Vec::new(),
            full: Vec::new(),
        })
    }

    fn push(&mut self, raw: &str) -> Result<()> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(());
        }
        let pattern = Pattern::new(trimmed).map_err(|e| Error::InvalidPattern {
            pattern: raw.to_string(),
            message: e.to_string(),
        })?;
        if trimmed.contains('/') {
            self.full.push(pattern);
        } else {
            self.component.push(pattern);
        }
        Ok(())
    }

    /// Whether a relative key (or any of its ancestors) is ignored.
    pub fn is_ignored(&self, key: &str) -> bool {
        let mut end = 0;
        for component in key.split('/') {
            end += component.len();
            let prefix = &key[..end];
            if self
                .component
                .iter()
                .any(|p| p.matches_with(component, MATCH_OPTIONS))
                || self.full.iter().any(|p| p.matches_with(prefix, MATCH_OPTIONS))
            {
                return true;
            }
            end += 1;
        }
        false
    }
}

impl Default for IgnoreSet {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Produces [`Snapshot`]s of directory trees.
#[derive(Debug, Clone)]
pub struct FileHasher {
    ignore: IgnoreSet,
    workers: usize,
}

impl FileHasher {
    /// Create a hasher with the given ignore set and worker pool size.
    pub fn new(ignore: IgnoreSet, workers: usize) -> Self {
        Self {
            ignore,
            workers: workers.max(1),
        }
    }

    /// The default pool size: available parallelism, capped at 8.
    pub fn default_workers() -> usize {
        thread::available_parallelism()
            .map(|n| n.get().min(8))
            .unwrap_or(1)
    }

    pub fn ignore(&self) -> &IgnoreSet {
        &self.ignore
    }

    /// Walk `root` and hash every non-ignored regular file.
    ///
    /// Symlinks are not followed. Unreadable entries become snapshot warnings
    /// instead of aborting the walk, and their keys are recorded as
    /// [`Snapshot::unreadable`] so callers can tell them apart from absent files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RootNotFound`] if `root` is not a directory.
    pub fn snapshot(&self, root: &Path) -> Result<Snapshot> {
        if !root.is_dir() {
            return Err(Error::RootNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut skipped = Skipped::default();
        let entries = self.collect_entries(root, &mut skipped);
        debug!(root = %root.display(), files = entries.len(), workers = self.workers, "Hashing tree");

        let records = self.hash_entries(&entries, &mut skipped);

        skipped.warnings.sort();
        Ok(Snapshot::new(root, records, skipped.warnings).with_unreadable(skipped.keys))
    }

    fn collect_entries(&self, root: &Path, skipped: &mut Skipped) -> Vec<(String, PathBuf)> {
        let mut entries = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || relative_key(root, entry.path())
                        .map(|key| !self.ignore.is_ignored(&key))
                        .unwrap_or(true)
            });

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    let location = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    warn!(path = %location, error = %e, "Skipping unreadable entry");
                    skipped
                        .warnings
                        .push(format!("Skipped unreadable entry {}: {}", location, e));
                    // The root itself failing leaves no key to protect
                    if let Some(key) = e.path().and_then(|p| relative_key(root, p)) {
                        skipped.keys.push(key);
                    }
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                if entry.file_type().is_symlink() {
                    debug!(path = %entry.path().display(), "Not following symlink");
                }
                continue;
            }

            match relative_key(root, entry.path()) {
                Some(key) => entries.push((key, entry.into_path())),
                None => {
                    warn!(path = %entry.path().display(), "Skipping file with non-portable name");
                    skipped.warnings.push(format!(
                        "Skipped file with non-portable name: {}",
                        entry.path().display()
                    ));
                }
            }
        }

        entries
    }

    fn hash_entries(&self, entries: &[(String, PathBuf)], skipped: &mut Skipped) -> Vec<FileRecord> {
        if entries.is_empty() {
            return Vec::new();
        }

        let workers = self.workers.min(entries.len());
        let next = AtomicUsize::new(0);
        let mut records = Vec::with_capacity(entries.len());

        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut out = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some((key, path)) = entries.get(index) else {
                                break;
                            };
                            out.push(hash_one(key, path));
                        }
                        out
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(results) => {
                        for result in results {
                            match result {
                                Ok(record) => records.push(record),
                                Err((key, message)) => {
                                    skipped.keys.push(key);
                                    skipped.warnings.push(message);
                                }
                            }
                        }
                    }
                    Err(_) => skipped
                        .warnings
                        .push("A hashing worker panicked".to_string()),
                }
            }
        });

        records
    }
}

/// Entries left out of a snapshot because they could not be read.
#[derive(Debug, Default)]
struct Skipped {
    keys: Vec<String>,
    warnings: Vec<String>,
}

impl Default for FileHasher {
    fn default() -> Self {
        Self::new(IgnoreSet::defaults(), Self::default_workers())
    }
}

fn hash_one(key: &str, path: &Path) -> std::result::Result<FileRecord, (String, String)> {
    match compute_file_checksum(path) {
        Ok((hash, size)) => {
            let mtime = std::fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            Ok(FileRecord {
                path: key.to_string(),
                hash,
                size,
                mtime,
            })
        }
        Err(e) => {
            warn!(path = %key, error = %e, "Skipping unreadable file");
            Err((
                key.to_string(),
                format!("Skipped unreadable file {}: {}", key, e),
            ))
        }
    }
}
