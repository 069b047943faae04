//! Names of the files kitsync keeps next to an installed kit.

use std::path::Path;

/// Directory inside the destination root holding all kitsync state.
///
/// Always excluded from snapshots.
pub const META_DIR: &str = ".kitsync";

/// Standard kitsync metadata locations, relative to the destination root.
///
/// The user configuration is not listed: it may use any of several
/// extensions and is located by `KitConfig::load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KitPath {
    /// Install metadata written by the installer
    InstallMeta,
    /// Baseline of the last successful sync
    SyncBaseline,
    /// Baseline of the last successful push
    PushBaseline,
    /// Root of all backups
    BackupsDir,
}

impl KitPath {
    /// Get the string representation of the path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstallMeta => ".kitsync/install.json",
            Self::SyncBaseline => ".kitsync/sync-baseline.json",
            Self::PushBaseline => ".kitsync/push-baseline.json",
            Self::BackupsDir => ".kitsync/backups",
        }
    }
}

impl AsRef<Path> for KitPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for KitPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for KitPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
