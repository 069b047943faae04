//! Error types for kit-core

use std::path::PathBuf;

/// Result type for kit-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kit-core operations
///
/// Only fatal conditions are errors. Unreadable files during hashing, conflicts,
/// refused dangerous operations and per-file execution failures are reported as
/// data on the [`Plan`](crate::Plan) or [`ExecutionResult`](crate::ExecutionResult).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The environment is unusable: install metadata missing or invalid,
    /// source package gone or not writable, unknown profile.
    #[error("{message}")]
    Environment { message: String },

    /// A persisted baseline exists but cannot be used
    #[error("Invalid baseline at {path}: {message}")]
    InvalidBaseline { path: PathBuf, message: String },

    /// Configuration file content is invalid
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// A conflict strategy was requested in a direction that does not support it
    #[error("Conflict strategy '{strategy}' is only valid for {allowed}")]
    InvalidStrategy {
        strategy: String,
        allowed: &'static str,
    },

    /// Taking the pre-execution backup failed; nothing was applied
    #[error("Backup failed: {message}")]
    Backup { message: String },

    /// The trees changed between approving a plan and applying it
    #[error("The {direction} plan changed after it was approved; review it and run again")]
    PlanChanged { direction: String },

    /// A backup identifier did not resolve to a stored backup
    #[error("Backup not found: {id}")]
    BackupNotFound { id: String },

    /// Git change detection failed inside a repository
    #[error("Git change detection failed: {0}")]
    Git(#[from] git2::Error),

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from kit-fs
    #[error(transparent)]
    Fs(#[from] kit_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an environment error with the given message
    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment {
            message: message.into(),
        }
    }

    /// Whether this error means the invocation cannot proceed at all
    pub fn is_environment(&self) -> bool {
        matches!(self, Self::Environment { .. })
    }
}
