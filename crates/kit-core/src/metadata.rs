//! Persisted kitsync state: install metadata and the two baselines.
//!
//! All files live under `<dest>/.kitsync/` as pretty-printed JSON and are
//! written atomically. Storage is behind the [`MetadataStore`] trait so the
//! engine can be driven by an in-memory store in tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kit_fs::{ConfigStore, KitPath, NormalizedPath, validate_relative};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::PlanSummary;
use crate::{Error, Result};

/// Current baseline format version.
pub const BASELINE_VERSION: &str = "1.0";

/// Direction marker stored in the push baseline.
pub const PUSH_DIRECTION: &str = "target_to_source";

/// `path -> hash` table wrapped as `{"hashes": {...}}` on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashTable {
    pub hashes: BTreeMap<String, String>,
}

impl From<BTreeMap<String, String>> for HashTable {
    fn from(hashes: BTreeMap<String, String>) -> Self {
        Self { hashes }
    }
}

/// Per-file hashes as of the last successful sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBaseline {
    pub version: String,
    pub last_sync: DateTime<Utc>,
    pub snapshot: HashTable,
}

impl SyncBaseline {
    pub fn new(hashes: BTreeMap<String, String>) -> Self {
        Self {
            version: BASELINE_VERSION.to_string(),
            last_sync: Utc::now(),
            snapshot: hashes.into(),
        }
    }

    pub fn hashes(&self) -> &BTreeMap<String, String> {
        &self.snapshot.hashes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSnapshots {
    pub target: HashTable,
}

/// Summary of the run that last wrote the push baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOperations {
    pub timestamp: DateTime<Utc>,
    pub operation_count: usize,
    pub summary: PlanSummary,
}

/// Per-file target hashes as of the last push that touched each file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushBaseline {
    pub version: String,
    pub last_push: DateTime<Utc>,
    pub direction: String,
    pub snapshots: PushSnapshots,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operations: Option<LastOperations>,
}

impl PushBaseline {
    pub fn new(hashes: BTreeMap<String, String>, last_operations: Option<LastOperations>) -> Self {
        Self {
            version: BASELINE_VERSION.to_string(),
            last_push: Utc::now(),
            direction: PUSH_DIRECTION.to_string(),
            snapshots: PushSnapshots {
                target: hashes.into(),
            },
            last_operations,
        }
    }

    pub fn hashes(&self) -> &BTreeMap<String, String> {
        &self.snapshots.target.hashes
    }
}

/// Written by the installer: where the kit came from and which profile is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallMeta {
    /// Source package location; relative paths resolve against the destination
    pub source_path: PathBuf,
    pub profile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
}

impl InstallMeta {
    pub fn new(source_path: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            profile: profile.into(),
            installed_at: Some(Utc::now()),
        }
    }

    /// The source location as an absolute path.
    pub fn resolve_source(&self, dest: &Path) -> PathBuf {
        if self.source_path.is_absolute() {
            self.source_path.clone()
        } else {
            dest.join(&self.source_path)
        }
    }
}

/// Storage for install metadata and baselines of one destination.
pub trait MetadataStore {
    /// Read install metadata. Missing or unreadable metadata is an environment error.
    fn read_install_meta(&self, dest: &Path) -> Result<InstallMeta>;

    /// Read the sync baseline; `None` if none was ever written.
    fn read_sync_baseline(&self, dest: &Path) -> Result<Option<SyncBaseline>>;

    fn write_sync_baseline(&self, dest: &Path, baseline: &SyncBaseline) -> Result<()>;

    /// Read the push baseline; `None` if none was ever written.
    fn read_push_baseline(&self, dest: &Path) -> Result<Option<PushBaseline>>;

    fn write_push_baseline(&self, dest: &Path, baseline: &PushBaseline) -> Result<()>;
}

/// [`MetadataStore`] backed by JSON files in `<dest>/.kitsync/`.
#[derive(Debug, Default)]
pub struct FsMetadataStore {
    store: ConfigStore,
}

impl FsMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn path(dest: &Path, which: KitPath) -> NormalizedPath {
        NormalizedPath::new(dest).join(which.as_str())
    }

    /// Write install metadata (the installer's side of the contract).
    pub fn write_install_meta(&self, dest: &Path, meta: &InstallMeta) -> Result<()> {
        self.store
            .save(&Self::path(dest, KitPath::InstallMeta), meta)?;
        Ok(())
    }

    fn read_baseline_file<T: serde::de::DeserializeOwned>(
        &self,
        dest: &Path,
        which: KitPath,
    ) -> Result<Option<T>> {
        let path = Self::path(dest, which);
        match self.store.load_optional::<T>(&path) {
            Ok(value) => Ok(value),
            Err(kit_fs::Error::ConfigParse { path, message, .. }) => {
                Err(Error::InvalidBaseline { path, message })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl MetadataStore for FsMetadataStore {
    fn read_install_meta(&self, dest: &Path) -> Result<InstallMeta> {
        let path = Self::path(dest, KitPath::InstallMeta);
        let meta: Option<InstallMeta> = self.store.load_optional(&path).map_err(|e| {
            Error::environment(format!("Cannot read install metadata at {}: {}", path, e))
        })?;
        let meta = meta.ok_or_else(|| {
            Error::environment(format!(
                "No kit installed at {} ({} not found)",
                dest.display(),
                KitPath::InstallMeta
            ))
        })?;
        if meta.profile.trim().is_empty() {
            return Err(Error::environment(format!(
                "Install metadata at {} names no profile",
                path
            )));
        }
        Ok(meta)
    }

    fn read_sync_baseline(&self, dest: &Path) -> Result<Option<SyncBaseline>> {
        let Some(mut baseline) =
            self.read_baseline_file::<SyncBaseline>(dest, KitPath::SyncBaseline)?
        else {
            debug!(dest = %dest.display(), "No sync baseline");
            return Ok(None);
        };
        check_version(dest, KitPath::SyncBaseline, &baseline.version)?;
        baseline.snapshot.hashes = sanitize_keys(std::mem::take(&mut baseline.snapshot.hashes));
        Ok(Some(baseline))
    }

    fn write_sync_baseline(&self, dest: &Path, baseline: &SyncBaseline) -> Result<()> {
        self.store
            .save(&Self::path(dest, KitPath::SyncBaseline), baseline)?;
        debug!(files = baseline.hashes().len(), "Wrote sync baseline");
        Ok(())
    }

    fn read_push_baseline(&self, dest: &Path) -> Result<Option<PushBaseline>> {
        let Some(mut baseline) =
            self.read_baseline_file::<PushBaseline>(dest, KitPath::PushBaseline)?
        else {
            debug!(dest = %dest.display(), "No push baseline");
            return Ok(None);
        };
        check_version(dest, KitPath::PushBaseline, &baseline.version)?;
        baseline.snapshots.target.hashes =
            sanitize_keys(std::mem::take(&mut baseline.snapshots.target.hashes));
        Ok(Some(baseline))
    }

    fn write_push_baseline(&self, dest: &Path, baseline: &PushBaseline) -> Result<()> {
        self.store
            .save(&Self::path(dest, KitPath::PushBaseline), baseline)?;
        debug!(files = baseline.hashes().len(), "Wrote push baseline");
        Ok(())
    }
}

fn check_version(dest: &Path, which: KitPath, version: &str) -> Result<()> {
    let major = version.split('.').next().unwrap_or_default();
    if major == "1" {
        return Ok(());
    }
    Err(Error::InvalidBaseline {
        path: dest.join(which.as_str()),
        message: format!(
            "unsupported baseline version '{}' (expected {})",
            version, BASELINE_VERSION
        ),
    })
}

/// Drop entries whose key is not a portable relative path.
fn sanitize_keys(hashes: BTreeMap<String, String>) -> BTreeMap<String, String> {
    hashes
        .into_iter()
        .filter_map(|(key, hash)| match validate_relative(&key) {
            Ok(clean) => Some((clean, hash)),
            Err(e) => {
                warn!(key = %key, error = %e, "Dropping invalid baseline entry");
                None
            }
        })
        .collect()
}

/// Access required on the source package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAccess {
    Read,
    Write,
}

/// Check that the recorded source package is usable, returning its canonical path.
///
/// # Errors
///
/// Returns [`Error::Environment`] if the source is missing, not a directory,
/// or (for [`SourceAccess::Write`]) not writable.
pub fn validate_source_path(
    meta: &InstallMeta,
    dest: &Path,
    access: SourceAccess,
) -> Result<PathBuf> {
    let source = meta.resolve_source(dest);
    if !source.exists() {
        return Err(Error::environment(format!(
            "Source package not found: {}",
            source.display()
        )));
    }
    if !source.is_dir() {
        return Err(Error::environment(format!(
            "Source package is not a directory: {}",
            source.display()
        )));
    }
    let source = dunce::canonicalize(&source).map_err(|e| {
        Error::environment(format!(
            "Cannot resolve source package {}: {}",
            source.display(),
            e
        ))
    })?;

    if access == SourceAccess::Write {
        let probe = source.join(format!(".kitsync-probe-{}", std::process::id()));
        fs::write(&probe, b"").map_err(|e| {
            Error::environment(format!(
                "Source package is not writable: {} ({})",
                source.display(),
                e
            ))
        })?;
        let _ = fs::remove_file(&probe);
    }

    Ok(source)
}
