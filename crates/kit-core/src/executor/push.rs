//! Applying a push plan to the source package.

use kit_fs::{FileHasher, RobustnessConfig};
use tracing::{info, warn};

use super::{apply_all, triage};
use crate::backup::BackupManager;
use crate::baseline::BaselineManager;
use crate::metadata::{MetadataStore, PushBaseline};
use crate::model::{Direction, ExecutionResult, OperationStatus, Plan, SyncOptions};
use crate::{Error, Result};

/// Executes destination to source plans.
///
/// The source package is shared, so its touched files are backed up (into the
/// destination's backup area) before anything is written.
pub struct PushExecutor<'a> {
    store: &'a dyn MetadataStore,
    hasher: &'a FileHasher,
    backups: &'a BackupManager,
    robustness: RobustnessConfig,
}

impl<'a> PushExecutor<'a> {
    pub fn new(
        store: &'a dyn MetadataStore,
        hasher: &'a FileHasher,
        backups: &'a BackupManager,
    ) -> Self {
        Self {
            store,
            hasher,
            backups,
            robustness: RobustnessConfig::default(),
        }
    }

    /// Apply `plan` with one conflict strategy for the whole run, then
    /// update the push baseline for the paths that were pushed or resolved.
    pub fn execute(
        &self,
        plan: &Plan,
        previous: Option<&PushBaseline>,
        options: &SyncOptions,
    ) -> Result<ExecutionResult> {
        let target = plan.from_root.as_path();
        let source = plan.to_root.as_path();
        let mut triage = triage(plan, options);

        let backup = if triage.run.is_empty() {
            None
        } else {
            let paths: Vec<String> = triage.run.iter().map(|op| op.path.clone()).collect();
            let info = self
                .backups
                .create(Direction::TargetToSource, source, &paths)
                .map_err(|e| Error::Backup {
                    message: e.to_string(),
                })?;
            Some(info)
        };

        let run = std::mem::take(&mut triage.run);
        let (applied, cancelled) =
            apply_all(run, target, source, &options.cancel, self.robustness);
        if cancelled {
            warn!("Push cancelled; remaining operations were not started");
            triage.warnings.push("Cancelled before all operations ran".to_string());
        }

        let mut outcomes = triage.skipped;
        outcomes.extend(applied);
        outcomes.sort_by(|a, b| a.operation.path.cmp(&b.operation.path));

        let target_after = self.hasher.snapshot(target)?;
        let baseline = BaselineManager::next_push(
            previous,
            &target_after,
            &outcomes,
            &triage.resolved,
            plan.summary,
        );
        self.store.write_push_baseline(target, &baseline)?;

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
            resolved = triage.resolved.len(),
            strategy = %options.conflict_strategy,
            "Push finished"
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
