//! Atomic I/O operations with file locking
//!
//! Every write goes to a temporary sibling first and is renamed into place, so
//! a reader (or a crash) never observes a half-written target file.

use std::fs::{self, File, OpenOptions};
use std::io::{self as stdio, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::ExponentialBackoff;
use fs2::FileExt;
use tracing::debug;

use crate::{Error, NormalizedPath, Result};

/// Tunables for locked atomic writes.
#[derive(Debug, Clone, Copy)]
pub struct RobustnessConfig {
    /// How long to keep retrying a contended lock before giving up.
    pub lock_timeout: Duration,
    /// Whether to fsync the temporary file before renaming it.
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            enable_fsync: true,
        }
    }
}

fn temp_sibling(target: &Path) -> PathBuf {
    let temp_name = format!(
        ".{}.{}.tmp",
        target
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    target.with_file_name(temp_name)
}

fn ensure_parent(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    Ok(())
}

/// Acquire an exclusive advisory lock on `<target>.lock`, retrying with
/// exponential backoff until `timeout` elapses.
fn acquire_lock(target: &Path, timeout: Duration) -> Result<File> {
    let lock_path = PathBuf::from(format!("{}.lock", target.display()));
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;

    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(250),
        max_elapsed_time: Some(timeout),
        ..ExponentialBackoff::default()
    };

    backoff::retry(policy, || {
        lock_file
            .try_lock_exclusive()
            .map_err(backoff::Error::transient)
    })
    .map_err(|_| Error::LockFailed {
        path: target.to_path_buf(),
    })?;

    Ok(lock_file)
}

fn release_lock(target: &Path, lock_file: File) {
    let _ = FileExt::unlock(&lock_file);
    drop(lock_file);
    let _ = fs::remove_file(format!("{}.lock", target.display()));
}

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Acquires an advisory lock on a `.lock` sibling to serialize writers.
pub fn write_atomic(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<()> {
    let native_path = path.to_native();
    ensure_parent(&native_path)?;

    let lock = acquire_lock(&native_path, config.lock_timeout)?;
    let result = write_temp_then_rename(&native_path, config, |temp| temp.write_all(content));
    release_lock(&native_path, lock);
    result
}

/// Copy `source` over `dest` atomically, streaming the content.
///
/// Missing parent directories of `dest` are created first. The destination is
/// either the complete new content or untouched, and carries the source's
/// permissions.
pub fn copy_atomic(source: &Path, dest: &Path, config: RobustnessConfig) -> Result<u64> {
    ensure_parent(dest)?;
    let mut reader = File::open(source).map_err(|e| Error::io(source, e))?;
    let permissions = reader
        .metadata()
        .map_err(|e| Error::io(source, e))?
        .permissions();
    let mut copied = 0u64;
    write_temp_then_rename(dest, config, |temp| {
        copied = stdio::copy(&mut reader, temp)?;
        temp.set_permissions(permissions)
    })?;
    debug!(source = %source.display(), dest = %dest.display(), bytes = copied, "Copied file");
    Ok(copied)
}

fn write_temp_then_rename<F>(target: &Path, config: RobustnessConfig, fill: F) -> Result<()>
where
    F: FnOnce(&mut File) -> stdio::Result<()>,
{
    let temp_path = temp_sibling(target);

    let outcome = (|| -> Result<()> {
        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| Error::io(&temp_path, e))?;

        fill(&mut temp_file).map_err(|e| Error::io(&temp_path, e))?;

        if config.enable_fsync {
            temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
        }
        drop(temp_file);

        fs::rename(&temp_path, target).map_err(|e| Error::io(target, e))
    })();

    if outcome.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    outcome
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Write text content to a file atomically with default robustness settings.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes(), RobustnessConfig::default())
}

/// Remove a file, then remove each now-empty parent directory up to (but not
/// including) `stop_at`.
pub fn remove_file_and_prune(stop_at: &Path, file: &Path) -> Result<()> {
    fs::remove_file(file).map_err(|e| Error::io(file, e))?;

    let mut current = file.parent();
    while let Some(dir) = current {
        if dir == stop_at || !dir.starts_with(stop_at) {
            break;
        }
        // read_dir is cheaper than attempting remove_dir on a populated directory
        let is_empty = fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            break;
        }
        fs::remove_dir(dir).map_err(|e| Error::io(dir, e))?;
        current = dir.parent();
    }
    Ok(())
}
