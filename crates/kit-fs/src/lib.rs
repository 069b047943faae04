//! Filesystem layer for kitsync
//!
//! Provides normalized paths, streaming checksums, atomic I/O, a
//! format-agnostic config store and the [`FileHasher`] that turns a directory
//! tree into a [`Snapshot`].

pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod hasher;
pub mod io;
pub mod path;
pub mod snapshot;

pub use config::{ConfigStore, Format};
pub use constants::{KitPath, META_DIR};
pub use error::{Error, Result};
pub use hasher::{FileHasher, IgnoreSet};
pub use io::RobustnessConfig;
pub use path::{NormalizedPath, relative_key, validate_path_identifier, validate_relative};
pub use snapshot::{FileRecord, Snapshot};
