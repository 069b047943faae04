//! Planning and execution layer for kitsync
//!
//! This crate reconciles an installed kit (the *destination*) with the shared
//! package it came from (the *source*), in both directions:
//!
//! - **Sync**: three-way diff of source, destination and the sync baseline,
//!   bringing package changes down without clobbering local edits
//! - **Push**: three-way diff of destination, source and the push baseline,
//!   restricted to an allow-list of pushable paths and a selection
//! - **Safety**: every operation carries a risk tier; dangerous paths need an
//!   explicit flag before they are written
//! - **Backups**: every run backs up the files it touches and can be rolled back
//!
//! # Architecture
//!
//! ```text
//!                      kit-cli
//!                         |
//!                   SyncEngine (engine)
//!                         |
//!     +---------+---------+----------+-----------+
//!     |         |                    |           |
//!  metadata  planner (pure)      executor      backup
//!     |         |                    |
//!     |    safety, selection     baseline
//!     |
//!   kit-fs (hasher, snapshots, atomic io, config store)
//! ```
//!
//! Planning never touches the filesystem, so the plan printed by a dry run is
//! the plan a real run executes.
//!
//! # Example
//!
//! ```no_run
//! use kit_core::{SyncEngine, SyncOptions};
//! use std::path::Path;
//!
//! fn preview(dest: &Path) -> kit_core::Result<()> {
//!     let engine = SyncEngine::open(dest)?;
//!     let report = engine.sync(&SyncOptions::dry_run())?;
//!     println!("{} operations", report.plan.summary.total);
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod baseline;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod model;
pub mod patterns;
pub mod planner;
pub mod safety;
pub mod selection;

pub use backup::{Backup, BackupInfo, BackupManager, BackupManifest, BackupRoot, RestoreReport};
pub use baseline::BaselineManager;
pub use config::{KitConfig, Profile, ProfileConfig, SafetyRules};
pub use engine::{RunReport, SyncEngine};
pub use error::{Error, Result};
pub use executor::{PushExecutor, SyncExecutor};
pub use metadata::{
    FsMetadataStore, InstallMeta, MetadataStore, PushBaseline, SourceAccess, SyncBaseline,
    validate_source_path,
};
pub use model::{
    Action, CancelFlag, ConflictStrategy, ConflictType, Direction, EstimatedImpact,
    ExecutionResult, Operation, OperationOutcome, OperationStatus, Plan, PlanSummary, Safety,
    SyncOptions,
};
pub use patterns::PathPatterns;
pub use planner::{CandidateStatus, PushCandidate, plan_push, plan_sync, push_candidates};
pub use safety::SafetyClassifier;
pub use selection::{
    AllSelection, PatternSelection, SelectionFilter, SelectionProvider, SelectionSet,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_errors_are_classified() {
        let error = Error::environment("Source package not found: /gone");
        assert!(error.is_environment());
        assert_eq!(error.to_string(), "Source package not found: /gone");
    }

    #[test]
    fn strategy_error_names_the_direction() {
        let error = Error::InvalidStrategy {
            strategy: "force_push".into(),
            allowed: "push",
        };
        assert!(!error.is_environment());
        assert!(error.to_string().contains("only valid for push"));
    }

    #[test]
    fn fs_errors_convert_transparently() {
        let fs_error = kit_fs::Error::RootNotFound {
            path: "/missing".into(),
        };
        let display = fs_error.to_string();
        let error: Error = fs_error.into();
        assert_eq!(error.to_string(), display);
    }
}
