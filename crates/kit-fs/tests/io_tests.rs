use kit_fs::{NormalizedPath, RobustnessConfig, io};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_write_atomic_creates_file() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("test.txt"));

    io::write_atomic(&path, b"hello world", RobustnessConfig::default()).unwrap();

    let content = fs::read_to_string(path.to_native()).unwrap();
    assert_eq!(content, "hello world");
}

#[test]
fn test_write_atomic_overwrites_existing() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("test.txt");
    fs::write(&file_path, "original").unwrap();

    let path = NormalizedPath::new(&file_path);
    io::write_text(&path, "updated").unwrap();

    let content = fs::read_to_string(&file_path).unwrap();
    assert_eq!(content, "updated");
}

#[test]
fn test_write_atomic_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join(".kitsync/nested/state.json"));

    io::write_text(&path, "{}").unwrap();

    assert!(path.is_file());
}

#[test]
fn test_lock_timeout_is_respected() {
    use fs2::FileExt;

    let dir = TempDir::new().unwrap();
    let file_path = dir.path().join("locked.txt");
    let lock_path = format!("{}.lock", file_path.display());

    let lock_file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .unwrap();
    lock_file.lock_exclusive().unwrap();

    let path = NormalizedPath::new(&file_path);
    let config = RobustnessConfig {
        lock_timeout: std::time::Duration::from_millis(300),
        enable_fsync: false,
    };

    let result = io::write_atomic(&path, b"content", config);
    drop(lock_file);

    assert!(result.is_err(), "Write should fail when lock is held");
    assert!(!file_path.exists());
}

#[test]
fn test_read_text_missing_file_reports_path() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("absent.txt"));

    let err = io::read_text(&path).unwrap_err();
    assert!(err.to_string().contains("absent.txt"));
}
