//! The orchestration entry point used by the CLI.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kit_fs::{FileHasher, Snapshot};
use tracing::{debug, info, warn};

use crate::backup::{Backup, BackupManager, BackupRoot, RestoreReport};
use crate::config::{KitConfig, Profile};
use crate::executor::{PushExecutor, SyncExecutor};
use crate::metadata::{
    FsMetadataStore, InstallMeta, MetadataStore, PushBaseline, SourceAccess, SyncBaseline,
    validate_source_path,
};
use crate::model::{ConflictStrategy, ExecutionResult, Plan, SyncOptions};
use crate::patterns::PathPatterns;
use crate::planner::{PushCandidate, PushPlanInput, SyncPlanInput, plan_push, plan_sync, push_candidates};
use crate::safety::SafetyClassifier;
use crate::selection::{SelectionProvider, SelectionSet, resolve_selection};
use crate::{Error, Result};

/// A computed plan and, unless the run was a dry run, what executing it did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub plan: Plan,
    pub result: Option<ExecutionResult>,
}

/// Ties metadata, hashing, planning and execution together for one destination.
///
/// Opening an engine fails fast when the install metadata is missing or the
/// recorded source package is gone.
pub struct SyncEngine<S: MetadataStore = FsMetadataStore> {
    dest: PathBuf,
    source: PathBuf,
    install: InstallMeta,
    config: KitConfig,
    profile: Profile,
    classifier: SafetyClassifier,
    pushable: PathPatterns,
    hasher: FileHasher,
    backups: BackupManager,
    store: S,
}

impl SyncEngine<FsMetadataStore> {
    /// Open the kit installed at `dest` using on-disk metadata.
    pub fn open(dest: &Path) -> Result<Self> {
        Self::with_store(dest, FsMetadataStore::new())
    }
}

impl<S: MetadataStore> SyncEngine<S> {
    pub fn with_store(dest: &Path, store: S) -> Result<Self> {
        if !dest.is_dir() {
            return Err(Error::environment(format!(
                "Destination not found: {}",
                dest.display()
            )));
        }
        let dest = dunce::canonicalize(dest).map_err(|e| {
            Error::environment(format!("Cannot resolve destination {}: {}", dest.display(), e))
        })?;

        let install = store.read_install_meta(&dest)?;
        let source = validate_source_path(&install, &dest, SourceAccess::Read)?;
        if source == dest {
            return Err(Error::environment(format!(
                "Source and destination are the same directory: {}",
                dest.display()
            )));
        }

        let config = KitConfig::load(&dest)?;
        let profile = config.profile(&install.profile)?;
        let classifier = SafetyClassifier::new(&config.safety)?;
        let pushable = config.pushable()?;
        let hasher = config.hasher()?;
        let backups = BackupManager::new(&dest);

        debug!(
            dest = %dest.display(),
            source = %source.display(),
            profile = profile.name(),
            "Opened kit"
        );

        Ok(Self {
            dest,
            source,
            install,
            config,
            profile,
            classifier,
            pushable,
            hasher,
            backups,
            store,
        })
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn install(&self) -> &InstallMeta {
        &self.install
    }

    pub fn config(&self) -> &KitConfig {
        &self.config
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    fn snapshots(&self) -> Result<(Snapshot, Snapshot)> {
        let source = self.hasher.snapshot(&self.source)?;
        let dest = self.hasher.snapshot(&self.dest)?;
        Ok((source, dest))
    }

    fn prepare_sync(&self) -> Result<(Plan, Snapshot, Option<SyncBaseline>)> {
        let (source, dest) = self.snapshots()?;
        let previous = self.store.read_sync_baseline(&self.dest)?;
        let empty = BTreeMap::new();
        let plan = plan_sync(SyncPlanInput {
            source: &source,
            dest: &dest,
            baseline: previous.as_ref().map(|b| b.hashes()).unwrap_or(&empty),
            profile: &self.profile,
            classifier: &self.classifier,
        });
        Ok((plan, source, previous))
    }

    /// Compute the sync plan without touching disk.
    pub fn plan_sync(&self) -> Result<Plan> {
        Ok(self.prepare_sync()?.0)
    }

    /// Plan a sync and, unless `options.dry_run`, execute it.
    pub fn sync(&self, options: &SyncOptions) -> Result<RunReport> {
        self.run_sync(options, None)
    }

    /// Like [`sync`](Self::sync), but only executes when a fresh plan makes
    /// the same changes as `approved`.
    ///
    /// The plan is always recomputed from the trees on disk, so anything
    /// edited since `approved` was shown gets an [`Error::PlanChanged`]
    /// instead of an unreviewed write.
    pub fn sync_approved(&self, options: &SyncOptions, approved: &Plan) -> Result<RunReport> {
        self.run_sync(options, Some(approved))
    }

    fn run_sync(&self, options: &SyncOptions, approved: Option<&Plan>) -> Result<RunReport> {
        if options.conflict_strategy != ConflictStrategy::Skip {
            return Err(Error::InvalidStrategy {
                strategy: options.conflict_strategy.to_string(),
                allowed: "push",
            });
        }

        let (plan, source, previous) = self.prepare_sync()?;
        if options.dry_run {
            return Ok(RunReport { plan, result: None });
        }
        check_approved(&plan, approved)?;

        let result = SyncExecutor::new(&self.store, &self.hasher, &self.backups, &self.profile)
            .execute(&plan, &source, previous.as_ref(), options)?;
        self.prune_backups();
        Ok(RunReport {
            plan,
            result: Some(result),
        })
    }

    fn prepare_push(&self) -> Result<(Snapshot, Snapshot, Option<PushBaseline>)> {
        let (source, target) = self.snapshots()?;
        let previous = self.store.read_push_baseline(&self.dest)?;
        Ok((target, source, previous))
    }

    /// Pushable paths with local changes, for a selection step.
    pub fn push_candidates(&self) -> Result<Vec<PushCandidate>> {
        let (target, source, previous) = self.prepare_push()?;
        let empty = BTreeMap::new();
        Ok(push_candidates(
            &target,
            &source,
            previous.as_ref().map(|b| b.hashes()).unwrap_or(&empty),
            &self.pushable,
            &self.classifier,
        ))
    }

    fn build_push_plan(
        &self,
        target: &Snapshot,
        source: &Snapshot,
        previous: Option<&PushBaseline>,
        selection: &SelectionSet,
        options: &SyncOptions,
    ) -> Result<Plan> {
        let filter = resolve_selection(selection, &self.dest)?;
        let empty = BTreeMap::new();
        Ok(plan_push(PushPlanInput {
            target,
            source,
            baseline: previous.map(|b| b.hashes()).unwrap_or(&empty),
            pushable: &self.pushable,
            selection: &filter,
            classifier: &self.classifier,
            allow_critical: options.allow_critical,
        }))
    }

    /// Compute the push plan for an explicit selection without touching disk.
    pub fn plan_push(&self, selection: &SelectionSet, options: &SyncOptions) -> Result<Plan> {
        let (target, source, previous) = self.prepare_push()?;
        self.build_push_plan(&target, &source, previous.as_ref(), selection, options)
    }

    /// Select, plan and, unless `options.dry_run`, execute a push.
    ///
    /// The provider is only consulted when there is something to choose from.
    pub fn push(
        &self,
        options: &SyncOptions,
        provider: &dyn SelectionProvider,
    ) -> Result<RunReport> {
        self.run_push(options, provider, None)
    }

    /// Like [`push`](Self::push), but only executes when a fresh plan makes
    /// the same changes as `approved`.
    pub fn push_approved(
        &self,
        options: &SyncOptions,
        provider: &dyn SelectionProvider,
        approved: &Plan,
    ) -> Result<RunReport> {
        self.run_push(options, provider, Some(approved))
    }

    fn run_push(
        &self,
        options: &SyncOptions,
        provider: &dyn SelectionProvider,
        approved: Option<&Plan>,
    ) -> Result<RunReport> {
        if !options.dry_run {
            validate_source_path(&self.install, &self.dest, SourceAccess::Write)?;
        }

        let (target, source, previous) = self.prepare_push()?;
        let empty = BTreeMap::new();
        let candidates = push_candidates(
            &target,
            &source,
            previous.as_ref().map(|b| b.hashes()).unwrap_or(&empty),
            &self.pushable,
            &self.classifier,
        );
        let selection = if candidates.is_empty() {
            SelectionSet::all()
        } else {
            provider.select(&candidates)?
        };

        let plan =
            self.build_push_plan(&target, &source, previous.as_ref(), &selection, options)?;
        if options.dry_run {
            return Ok(RunReport { plan, result: None });
        }
        check_approved(&plan, approved)?;

        let result = PushExecutor::new(&self.store, &self.hasher, &self.backups).execute(
            &plan,
            previous.as_ref(),
            options,
        )?;
        self.prune_backups();
        Ok(RunReport {
            plan,
            result: Some(result),
        })
    }

    fn prune_backups(&self) {
        match self.backups.prune(self.config.backup_retention) {
            Ok(removed) if !removed.is_empty() => {
                debug!(count = removed.len(), "Pruned old backups");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to prune old backups"),
        }
    }

    /// Stored backups, newest first.
    pub fn backups(&self) -> Result<Vec<Backup>> {
        self.backups.list()
    }

    /// Restore the tree a backup was taken of.
    ///
    /// Baselines are left as they are, so files put back by a rollback show
    /// up as local modifications on the next run instead of being overwritten.
    pub fn rollback(&self, id: &str) -> Result<RestoreReport> {
        let backup = self
            .backups
            .get(id)?
            .ok_or_else(|| Error::BackupNotFound { id: id.to_string() })?;
        let tree = match backup.manifest.root {
            BackupRoot::Destination => &self.dest,
            BackupRoot::Source => {
                validate_source_path(&self.install, &self.dest, SourceAccess::Write)?;
                &self.source
            }
        };
        let report = self.backups.restore(id, tree)?;
        info!(id, tree = %tree.display(), "Rolled back");
        Ok(report)
    }
}

fn check_approved(plan: &Plan, approved: Option<&Plan>) -> Result<()> {
    match approved {
        Some(approved) if !approved.same_changes(plan) => {
            warn!(
                approved = approved.summary.total,
                current = plan.summary.total,
                "Plan changed since approval"
            );
            Err(Error::PlanChanged {
                direction: plan.direction.to_string(),
            })
        }
        _ => Ok(()),
    }
}
