//! User configuration for an installed kit.
//!
//! Configuration lives at `.kitsync/config.toml` inside the destination
//! (`config.json` and `config.yaml` are also accepted). Every field has a
//! default, so a missing file or a partial file is valid.

use std::collections::BTreeMap;
use std::path::Path;

use kit_fs::{ConfigStore, FileHasher, IgnoreSet, META_DIR, NormalizedPath};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::patterns::PathPatterns;
use crate::{Error, Result};

const CONFIG_FILES: &[&str] = &["config.toml", "config.json", "config.yaml", "config.yml"];

fn default_ignore() -> Vec<String> {
    kit_fs::hasher::DEFAULT_IGNORE
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Glob lists that assign a safety tier. Dangerous wins over caution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyRules {
    pub dangerous: Vec<String>,
    pub caution: Vec<String>,
}

impl Default for SafetyRules {
    fn default() -> Self {
        Self {
            dangerous: strings(&["settings.json", "settings.local.json", "hooks/**"]),
            caution: strings(&["*.json", "*.sh", "*.py"]),
        }
    }
}

/// Raw profile definition as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Paths included by the profile. Empty means everything.
    pub include: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KitConfig {
    /// Ignore patterns applied when hashing both trees
    pub ignore: Vec<String>,
    /// Paths that may be pushed back to the source
    pub pushable: Vec<String>,
    /// Hashing worker count; defaults to available parallelism capped at 8
    pub workers: Option<usize>,
    /// Number of backups kept after each run
    pub backup_retention: usize,
    pub safety: SafetyRules,
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl Default for KitConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert("full".to_string(), ProfileConfig::default());
        profiles.insert(
            "minimal".to_string(),
            ProfileConfig {
                include: strings(&["commands", "agents"]),
            },
        );

        Self {
            ignore: default_ignore(),
            pushable: strings(&["commands", "agents", "templates"]),
            workers: None,
            backup_retention: 10,
            safety: SafetyRules::default(),
            profiles,
        }
    }
}

impl KitConfig {
    /// Load configuration from the destination's metadata directory.
    ///
    /// The first existing `config.{toml,json,yaml,yml}` wins. Returns the
    /// defaults when none exists.
    pub fn load(dest: &Path) -> Result<Self> {
        let store = ConfigStore::new();
        let meta = NormalizedPath::new(dest).join(META_DIR);
        for name in CONFIG_FILES {
            let path = meta.join(name);
            if let Some(config) = store.load_optional::<Self>(&path)? {
                debug!(path = %path, "Loaded configuration");
                config.validate()?;
                return Ok(config);
            }
        }
        Ok(Self::default())
    }

    /// Check that every pattern list compiles and numeric settings are sane.
    pub fn validate(&self) -> Result<()> {
        IgnoreSet::new(&self.ignore)?;
        PathPatterns::new(&self.pushable)?;
        PathPatterns::new(&self.safety.dangerous)?;
        PathPatterns::new(&self.safety.caution)?;
        for profile in self.profiles.values() {
            PathPatterns::new(&profile.include)?;
        }
        if self.workers == Some(0) {
            return Err(Error::Config {
                message: "workers must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve a profile by name.
    ///
    /// # Errors
    ///
    /// An unknown profile name is an environment error.
    pub fn profile(&self, name: &str) -> Result<Profile> {
        let raw = self.profiles.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
            Error::environment(format!(
                "Unknown profile '{}' (configured: {})",
                name,
                known.join(", ")
            ))
        })?;
        Ok(Profile {
            name: name.to_string(),
            include: PathPatterns::new(&raw.include)?,
        })
    }

    /// Build the hasher used for both trees.
    pub fn hasher(&self) -> Result<FileHasher> {
        let ignore = IgnoreSet::new(&self.ignore)?;
        let workers = self.workers.unwrap_or_else(FileHasher::default_workers);
        Ok(FileHasher::new(ignore, workers))
    }

    pub fn pushable(&self) -> Result<PathPatterns> {
        PathPatterns::new(&self.pushable)
    }
}

/// A resolved profile: the subset of the source kit that is installed.
#[derive(Debug, Clone)]
pub struct Profile {
    name: String,
    include: PathPatterns,
}

impl Profile {
    /// A profile that includes every path.
    pub fn all(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            include: PathPatterns::default(),
        }
    }

    pub fn new(name: impl Into<String>, include: PathPatterns) -> Self {
        Self {
            name: name.into(),
            include,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, key: &str) -> bool {
        self.include.is_empty() || self.include.matches(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_when_no_config_file() {
        let dir = tempdir().unwrap();
        let config = KitConfig::load(dir.path()).unwrap();
        assert_eq!(config, KitConfig::default());
        assert_eq!(config.backup_retention, 10);
        assert!(config.profiles.contains_key("full"));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".kitsync")).unwrap();
        fs::write(
            dir.path().join(".kitsync/config.toml"),
            "pushable = [\"commands\"]\nworkers = 2\n",
        )
        .unwrap();

        let config = KitConfig::load(dir.path()).unwrap();
        assert_eq!(config.pushable, vec!["commands".to_string()]);
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.safety, SafetyRules::default());
    }

    #[test]
    fn json_config_is_accepted() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".kitsync")).unwrap();
        fs::write(
            dir.path().join(".kitsync/config.json"),
            r#"{"profiles": {"docs": {"include": ["docs"]}}}"#,
        )
        .unwrap();

        let config = KitConfig::load(dir.path()).unwrap();
        let profile = config.profile("docs").unwrap();
        assert!(profile.contains("docs/a.md"));
        assert!(!profile.contains("commands/a.md"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".kitsync")).unwrap();
        fs::write(
            dir.path().join(".kitsync/config.toml"),
            "[safety]\ndangerous = [\"hooks/[\"]\n",
        )
        .unwrap();

        assert!(matches!(
            KitConfig::load(dir.path()),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn unknown_profile_is_environment_error() {
        let err = KitConfig::default().profile("nope").unwrap_err();
        assert!(err.is_environment());
        assert!(err.to_string().contains("full"));
    }

    #[test]
    fn full_profile_includes_everything() {
        let profile = KitConfig::default().profile("full").unwrap();
        assert!(profile.contains("anything/at/all.md"));

        let minimal = KitConfig::default().profile("minimal").unwrap();
        assert!(minimal.contains("agents/a.md"));
        assert!(!minimal.contains("templates/t.md"));
    }
}
