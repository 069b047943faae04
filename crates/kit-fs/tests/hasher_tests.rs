//! Snapshot behaviour against real trees built with assert_fs.

use assert_fs::prelude::*;
use kit_fs::checksum::compute_content_checksum;
use kit_fs::{FileHasher, IgnoreSet};
use pretty_assertions::assert_eq;

#[test]
fn snapshot_keys_are_relative_and_portable() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("commands/git/commit.md").write_str("commit").unwrap();
    temp.child("settings.json").write_str("{}").unwrap();

    let snapshot = FileHasher::default().snapshot(temp.path()).unwrap();

    let paths: Vec<&str> = snapshot.paths().collect();
    assert_eq!(paths, vec!["commands/git/commit.md", "settings.json"]);
    for path in snapshot.paths() {
        assert!(!path.starts_with('/'));
        assert!(!path.contains('\\'));
    }
}

#[test]
fn custom_ignore_patterns_are_honoured() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("commands/a.md").write_str("a").unwrap();
    temp.child("commands/a.md.bak").write_str("old").unwrap();
    temp.child("drafts/wip.md").write_str("wip").unwrap();

    let ignore = IgnoreSet::new(["*.bak", "drafts"]).unwrap();
    let snapshot = FileHasher::new(ignore, 4).snapshot(temp.path()).unwrap();

    let paths: Vec<&str> = snapshot.paths().collect();
    assert_eq!(paths, vec!["commands/a.md"]);
}

#[test]
fn identical_content_has_identical_hash_across_trees() {
    let left = assert_fs::TempDir::new().unwrap();
    let right = assert_fs::TempDir::new().unwrap();
    left.child("agents/x.md").write_str("same").unwrap();
    right.child("agents/x.md").write_str("same").unwrap();

    let hasher = FileHasher::default();
    let a = hasher.snapshot(left.path()).unwrap();
    let b = hasher.snapshot(right.path()).unwrap();

    assert_eq!(a.hashes(), b.hashes());
    assert_eq!(
        a.hash_of("agents/x.md"),
        Some(compute_content_checksum(b"same").as_str())
    );
}

#[cfg(unix)]
#[test]
fn unreadable_file_becomes_warning() {
    use std::os::unix::fs::PermissionsExt;

    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("ok.md").write_str("ok").unwrap();
    let locked = temp.child("locked.md");
    locked.write_str("secret").unwrap();
    std::fs::set_permissions(locked.path(), std::fs::Permissions::from_mode(0o000)).unwrap();

    // Root can read anything; nothing to assert in that case
    if std::fs::read(locked.path()).is_ok() {
        return;
    }

    let snapshot = FileHasher::default().snapshot(temp.path()).unwrap();
    std::fs::set_permissions(locked.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

    assert!(snapshot.contains("ok.md"));
    assert!(!snapshot.contains("locked.md"));
    assert_eq!(snapshot.warnings().len(), 1);
    assert!(snapshot.warnings()[0].contains("locked.md"));
}
