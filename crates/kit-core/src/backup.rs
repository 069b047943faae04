//! Pre-execution backups and rollback.
//!
//! Every run that mutates a tree first copies the files it is about to touch
//! into `<dest>/.kitsync/backups/<id>/files/`, alongside a `manifest.json`.
//! Backups of the source package are stored in the destination too, so the
//! shared package is never cluttered.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kit_fs::io::{RobustnessConfig, copy_atomic, remove_file_and_prune};
use kit_fs::{ConfigStore, KitPath, NormalizedPath, validate_path_identifier, validate_relative};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::Direction;
use crate::{Error, Result};

const MANIFEST: &str = "manifest.json";
const FILES_DIR: &str = "files";

/// Which tree a backup was taken of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupRoot {
    Destination,
    Source,
}

impl From<Direction> for BackupRoot {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::SourceToDest => Self::Destination,
            Direction::TargetToSource => Self::Source,
        }
    }
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub id: String,
    pub direction: Direction,
    pub created: DateTime<Utc>,
    pub root: BackupRoot,
    /// Relative paths copied into the backup
    pub files: Vec<String>,
    /// Touched paths that did not exist; rollback removes them
    pub absent: Vec<String>,
}

/// A stored backup.
#[derive(Debug, Clone)]
pub struct Backup {
    pub path: PathBuf,
    pub manifest: BackupManifest,
}

/// Reference to a backup, as reported in an execution result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub id: String,
    pub path: PathBuf,
}

/// What a rollback did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    pub removed: Vec<String>,
}

/// Manages the backups of one destination.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backups_dir: NormalizedPath,
    robustness: RobustnessConfig,
}

impl BackupManager {
    pub fn new(dest: &Path) -> Self {
        Self {
            backups_dir: NormalizedPath::new(dest).join(KitPath::BackupsDir.as_str()),
            robustness: RobustnessConfig::default(),
        }
    }

    pub fn backups_dir(&self) -> &NormalizedPath {
        &self.backups_dir
    }

    fn validate_id(id: &str) -> Result<()> {
        validate_path_identifier(id, "Backup id").map_err(|message| Error::Backup { message })
    }

    /// Copy `paths` (relative to `tree`) into a new backup.
    ///
    /// Paths that do not exist are recorded as absent.
    pub fn create(&self, direction: Direction, tree: &Path, paths: &[String]) -> Result<BackupInfo> {
        let (id, dir) = self.allocate(direction)?;
        let files_dir = dir.join(FILES_DIR);

        let mut files = Vec::new();
        let mut absent = Vec::new();
        for raw in paths {
            let key = validate_relative(raw)?;
            let original = tree.join(&key);
            if original.is_file() {
                copy_atomic(&original, &files_dir.join(&key), self.robustness)?;
                files.push(key);
            } else {
                absent.push(key);
            }
        }

        let manifest = BackupManifest {
            id: id.clone(),
            direction,
            created: Utc::now(),
            root: direction.into(),
            files,
            absent,
        };
        ConfigStore::with_robustness(self.robustness)
            .save(&NormalizedPath::new(&dir).join(MANIFEST), &manifest)?;

        info!(
            id = %id,
            files = manifest.files.len(),
            absent = manifest.absent.len(),
            "Created backup"
        );
        Ok(BackupInfo { id, path: dir })
    }

    /// Reserve a fresh `<direction>-<timestamp>-<n>` directory.
    fn allocate(&self, direction: Direction) -> Result<(String, PathBuf)> {
        let base = self.backups_dir.to_native();
        fs::create_dir_all(&base).map_err(|e| kit_fs::Error::io(&base, e))?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let mut n = 1u32;
        loop {
            let id = format!("{}-{}-{}", direction.as_str(), stamp, n);
            let dir = base.join(&id);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((id, dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(kit_fs::Error::io(&dir, e).into()),
            }
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<Backup>> {
        Self::validate_id(id)?;
        let dir = self.backups_dir.join(id);
        let manifest_path = dir.join(MANIFEST);
        let Some(manifest) = ConfigStore::new().load_optional::<BackupManifest>(&manifest_path)?
        else {
            return Ok(None);
        };
        Ok(Some(Backup {
            path: dir.to_native(),
            manifest,
        }))
    }

    /// All readable backups, newest first.
    pub fn list(&self) -> Result<Vec<Backup>> {
        let base = self.backups_dir.to_native();
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&base).map_err(|e| kit_fs::Error::io(&base, e))? {
            let entry = entry.map_err(|e| kit_fs::Error::io(&base, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match self.get(&id) {
                Ok(Some(backup)) => backups.push(backup),
                Ok(None) => debug!(id = %id, "Ignoring directory without manifest"),
                Err(e) => warn!(id = %id, error = %e, "Ignoring unreadable backup"),
            }
        }

        backups.sort_by(|a, b| {
            b.manifest
                .created
                .cmp(&a.manifest.created)
                .then_with(|| b.manifest.id.cmp(&a.manifest.id))
        });
        Ok(backups)
    }

    /// Put `tree` back the way it was when backup `id` was taken.
    ///
    /// Backed-up files are copied back; paths recorded as absent are removed.
    pub fn restore(&self, id: &str, tree: &Path) -> Result<RestoreReport> {
        let backup = self.get(id)?.ok_or_else(|| Error::BackupNotFound { id: id.to_string() })?;
        let files_dir = backup.path.join(FILES_DIR);
        let mut report = RestoreReport::default();

        // Removals first: a created `foo/bar.md` must go before a file `foo` returns
        for key in &backup.manifest.absent {
            let key = Self::contained(key)?;
            let target = tree.join(&key);
            if target.is_file() {
                remove_file_and_prune(tree, &target)?;
                report.removed.push(key);
            }
        }
        for key in &backup.manifest.files {
            let key = Self::contained(key)?;
            copy_atomic(&files_dir.join(&key), &tree.join(&key), self.robustness)?;
            report.restored.push(key);
        }

        info!(
            id = %id,
            restored = report.restored.len(),
            removed = report.removed.len(),
            "Restored backup"
        );
        Ok(report)
    }

    fn contained(key: &str) -> Result<String> {
        validate_relative(key).map_err(|e| Error::Backup {
            message: format!("Refusing to restore path outside the tree: {}", e),
        })
    }

    /// Delete all but the newest `keep` backups. Returns the removed ids.
    pub fn prune(&self, keep: usize) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for backup in self.list()?.into_iter().skip(keep) {
            fs::remove_dir_all(&backup.path).map_err(|e| kit_fs::Error::io(&backup.path, e))?;
            debug!(id = %backup.manifest.id, "Pruned backup");
            removed.push(backup.manifest.id);
        }
        Ok(removed)
    }
}
