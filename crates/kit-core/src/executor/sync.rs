//! Applying a sync plan to the destination.

use kit_fs::{FileHasher, RobustnessConfig, Snapshot};
use tracing::{info, warn};

use super::{apply_all, triage};
use crate::backup::BackupManager;
use crate::baseline::BaselineManager;
use crate::config::Profile;
use crate::metadata::{MetadataStore, SyncBaseline};
use crate::model::{ConflictStrategy, Direction, ExecutionResult, OperationStatus, Plan, SyncOptions};
use crate::{Error, Result};

/// Executes source to destination plans.
pub struct SyncExecutor<'a> {
    store: &'a dyn MetadataStore,
    hasher: &'a FileHasher,
    backups: &'a BackupManager,
    profile: &'a Profile,
    robustness: RobustnessConfig,
}

impl<'a> SyncExecutor<'a> {
    pub fn new(
        store: &'a dyn MetadataStore,
        hasher: &'a FileHasher,
        backups: &'a BackupManager,
        profile: &'a Profile,
    ) -> Self {
        Self {
            store,
            hasher,
            backups,
            profile,
            robustness: RobustnessConfig::default(),
        }
    }

    /// Apply `plan`, then persist the new sync baseline.
    ///
    /// `source` is the snapshot the plan was computed from and `previous` the
    /// baseline it was diffed against.
    ///
    /// # Errors
    ///
    /// Push-only conflict strategies are rejected before anything is touched.
    /// A failed backup aborts the run. Per-operation failures are not errors;
    /// they are recorded in the returned [`ExecutionResult`].
    pub fn execute(
        &self,
        plan: &Plan,
        source: &Snapshot,
        previous: Option<&SyncBaseline>,
        options: &SyncOptions,
    ) -> Result<ExecutionResult> {
        if options.conflict_strategy != ConflictStrategy::Skip {
            return Err(Error::InvalidStrategy {
                strategy: options.conflict_strategy.to_string(),
                allowed: "push",
            });
        }

        let dest = plan.to_root.as_path();
        let mut triage = triage(plan, options);

        let backup = if triage.run.is_empty() {
            None
        } else {
            let paths: Vec<String> = triage.run.iter().map(|op| op.path.clone()).collect();
            let info = self
                .backups
                .create(Direction::SourceToDest, dest, &paths)
                .map_err(|e| Error::Backup {
                    message: e.to_string(),
                })?;
            Some(info)
        };

        let run = std::mem::take(&mut triage.run);
        let (applied, cancelled) =
            apply_all(run, &plan.from_root, dest, &options.cancel, self.robustness);
        if cancelled {
            warn!("Sync cancelled; remaining operations were not started");
            triage.warnings.push("Cancelled before all operations ran".to_string());
        }

        let mut outcomes = triage.skipped;
        outcomes.extend(applied);
        outcomes.sort_by(|a, b| a.operation.path.cmp(&b.operation.path));

        let dest_after = self.hasher.snapshot(dest)?;
        let baseline =
            BaselineManager::next_sync(previous, source, &dest_after, self.profile, &outcomes);
        self.store.write_sync_baseline(dest, &baseline)?;

        let completed = outcomes
            .iter()
            .filter(|o| o.status == OperationStatus::Completed)
            .count();
        let failed = outcomes
            .iter()
            .filter(|o| o.status == OperationStatus::Failed)
            .count();
        info!(
            completed,
            failed,
            skipped = outcomes.len() - completed - failed,
            "Sync finished"
        );

        Ok(ExecutionResult {
            success: failed == 0,
            rollback_available: backup.is_some() && completed > 0,
            backup,
            operations: outcomes,
            cancelled,
            warnings: triage.warnings,
        })
    }
}
