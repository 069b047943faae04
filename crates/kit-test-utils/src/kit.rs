//! [`TestKit`] builder for sync and push scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::git;

/// A temporary source package and an installed destination.
///
/// The destination carries `.kitsync/install.json` pointing at the source, so
/// it can be opened by the engine or the CLI straight away.
///
/// # Example
///
/// ```rust,no_run
/// use kit_test_utils::TestKit;
///
/// let kit = TestKit::new("full");
/// kit.write_source("commands/review.md", "review");
/// // run a sync against kit.dest() ...
/// kit.assert_dest_content("commands/review.md", "review");
/// ```
pub struct TestKit {
    temp_dir: TempDir,
    source: PathBuf,
    dest: PathBuf,
}

impl TestKit {
    /// Create a source and a destination installed with `profile`.
    pub fn new(profile: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let dest = temp_dir.path().join("dest");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(dest.join(".kitsync")).unwrap();

        let meta = serde_json::json!({
            "sourcePath": source,
            "profile": profile,
            "installedAt": "2024-01-01T00:00:00Z",
        });
        fs::write(
            dest.join(".kitsync/install.json"),
            serde_json::to_string_pretty(&meta).unwrap(),
        )
        .unwrap();

        Self {
            temp_dir,
            source,
            dest,
        }
    }

    /// The temporary directory holding both trees.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Write `.kitsync/config.toml` in the destination.
    pub fn write_config(&self, toml: &str) {
        fs::write(self.dest.join(".kitsync/config.toml"), toml).unwrap();
    }

    pub fn write_source(&self, key: &str, content: &str) {
        write(&self.source, key, content);
    }

    pub fn write_dest(&self, key: &str, content: &str) {
        write(&self.dest, key, content);
    }

    pub fn remove_source(&self, key: &str) {
        fs::remove_file(self.source.join(key)).unwrap();
    }

    pub fn remove_dest(&self, key: &str) {
        fs::remove_file(self.dest.join(key)).unwrap();
    }

    pub fn read_source(&self, key: &str) -> String {
        fs::read_to_string(self.source.join(key)).unwrap()
    }

    pub fn read_dest(&self, key: &str) -> String {
        fs::read_to_string(self.dest.join(key)).unwrap()
    }

    /// Turn the destination into a git repository with everything committed.
    pub fn init_dest_git(&self) -> git2::Repository {
        let repo = git::real_git_repo(&self.dest);
        git::commit_all(&repo, "Initial commit");
        repo
    }

    /// Assert that `key` in the destination holds exactly `expected`.
    ///
    /// # Panics
    /// Panics with a descriptive message on mismatch or if the file is missing.
    pub fn assert_dest_content(&self, key: &str, expected: &str) {
        assert_content(&self.dest, "destination", key, expected);
    }

    /// Assert that `key` in the source holds exactly `expected`.
    pub fn assert_source_content(&self, key: &str, expected: &str) {
        assert_content(&self.source, "source", key, expected);
    }

    pub fn assert_dest_missing(&self, key: &str) {
        assert!(
            !self.dest.join(key).exists(),
            "Expected {} to be absent from the destination",
            key
        );
    }

    pub fn assert_source_missing(&self, key: &str) {
        assert!(
            !self.source.join(key).exists(),
            "Expected {} to be absent from the source",
            key
        );
    }
}

fn write(root: &Path, key: &str, content: &str) {
    let path = root.join(key);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn assert_content(root: &Path, label: &str, key: &str, expected: &str) {
    let path = root.join(key);
    assert!(
        path.is_file(),
        "Expected {} to exist in the {}",
        key,
        label
    );
    let actual = fs::read_to_string(&path).unwrap();
    assert_eq!(
        actual, expected,
        "Content mismatch for {} in the {}",
        key, label
    );
}
