//! Plan and execution data model shared by planners and executors.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use kit_fs::Snapshot;
use serde::{Deserialize, Serialize};

use crate::backup::BackupInfo;

/// Which way content flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Package source to the installed destination (sync)
    SourceToDest,
    /// Installed destination back to the package source (push)
    TargetToSource,
}

impl Direction {
    /// Short name used in backup identifiers and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceToDest => "sync",
            Self::TargetToSource => "push",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Risk tier of touching a path. Ordered, so `max` yields the plan risk.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Safety {
    #[default]
    Safe,
    Caution,
    Dangerous,
}

impl fmt::Display for Safety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Safe => "safe",
            Self::Caution => "caution",
            Self::Dangerous => "dangerous",
        })
    }
}

/// Why a path could not be reconciled automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Only the written side changed since the baseline
    LocalModified,
    /// Both sides changed since the baseline, to different content
    BothModified,
    /// Both sides hold different content and no baseline exists
    NoBaseline,
    /// The reading side removed a file the written side modified
    ModifiedDeleted,
}

impl ConflictType {
    pub fn description(&self) -> &'static str {
        match self {
            Self::LocalModified => "modified locally since last baseline",
            Self::BothModified => "modified on both sides since last baseline",
            Self::NoBaseline => "differs and no baseline exists",
            Self::ModifiedDeleted => "deleted on one side, modified on the other",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// How conflicted operations are resolved for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Leave conflicting files untouched
    #[default]
    Skip,
    /// Overwrite the source with the target's version (push only)
    ForcePush,
    /// Discard the target-side change (push only)
    KeepSource,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::ForcePush => "force_push",
            Self::KeepSource => "keep_source",
        }
    }
}

impl FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Self::Skip),
            "force_push" | "force-push" => Ok(Self::ForcePush),
            "keep_source" | "keep-source" => Ok(Self::KeepSource),
            other => Err(format!(
                "unknown conflict strategy '{}' (expected skip, force_push or keep_source)",
                other
            )),
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single planned file operation. Unique per path within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub path: String,
    pub action: Action,
    pub safety: Safety,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictType>,
    /// Bytes written by this operation (0 for deletes)
    pub size: u64,
}

impl Operation {
    pub fn new(path: impl Into<String>, action: Action, size: u64) -> Self {
        Self {
            path: path.into(),
            action,
            safety: Safety::Safe,
            conflict: None,
            size,
        }
    }

    pub fn with_safety(mut self, safety: Safety) -> Self {
        self.safety = safety;
        self
    }

    pub fn with_conflict(mut self, conflict: ConflictType) -> Self {
        self.conflict = Some(conflict);
        self
    }

    pub fn is_conflict(&self) -> bool {
        self.conflict.is_some()
    }

    pub fn is_dangerous(&self) -> bool {
        self.safety == Safety::Dangerous
    }
}

/// Per-action operation counts. Conflicted operations count only as conflicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub conflict: usize,
    pub total: usize,
}

impl PlanSummary {
    pub fn from_operations(operations: &[Operation]) -> Self {
        let mut summary = Self {
            total: operations.len(),
            ..Self::default()
        };
        for op in operations {
            if op.is_conflict() {
                summary.conflict += 1;
                continue;
            }
            match op.action {
                Action::Create => summary.create += 1,
                Action::Update => summary.update += 1,
                Action::Delete => summary.delete += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedImpact {
    /// Highest safety tier among the operations
    pub risk_level: Safety,
    /// Bytes that executing every write would copy
    pub total_bytes: u64,
}

/// Summary of the snapshot a plan was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub root: PathBuf,
    pub file_count: usize,
    pub taken_at: DateTime<Utc>,
}

impl From<&Snapshot> for SnapshotInfo {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            root: snapshot.root().to_path_buf(),
            file_count: snapshot.file_count(),
            taken_at: snapshot.taken_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshots {
    pub source: SnapshotInfo,
    pub destination: SnapshotInfo,
}

/// The computed set of operations reconciling two trees.
///
/// `from_root` is the tree content is read from and `to_root` the tree that
/// is written: source/destination for sync, destination/source for push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub direction: Direction,
    pub from_root: PathBuf,
    pub to_root: PathBuf,
    pub operations: Vec<Operation>,
    pub summary: PlanSummary,
    pub conflicts: Vec<Operation>,
    /// Dangerous operations withheld pending explicit confirmation
    pub blocked: Vec<Operation>,
    pub warnings: Vec<String>,
    pub estimated_impact: EstimatedImpact,
    pub snapshots: PlanSnapshots,
    pub duration_ms: u64,
}

impl Plan {
    /// Assemble a plan, deriving summary, conflicts and impact from `operations`.
    pub fn assemble(
        direction: Direction,
        from: &Snapshot,
        to: &Snapshot,
        mut operations: Vec<Operation>,
        blocked: Vec<Operation>,
        warnings: Vec<String>,
    ) -> Self {
        operations.sort_by(|a, b| a.path.cmp(&b.path));
        let summary = PlanSummary::from_operations(&operations);
        let conflicts = operations
            .iter()
            .filter(|op| op.is_conflict())
            .cloned()
            .collect();
        let estimated_impact = EstimatedImpact {
            risk_level: operations
                .iter()
                .chain(blocked.iter())
                .map(|op| op.safety)
                .max()
                .unwrap_or_default(),
            total_bytes: operations.iter().map(|op| op.size).sum(),
        };
        let (source, destination) = match direction {
            Direction::SourceToDest => (from, to),
            Direction::TargetToSource => (to, from),
        };

        Self {
            direction,
            from_root: from.root().to_path_buf(),
            to_root: to.root().to_path_buf(),
            operations,
            summary,
            conflicts,
            blocked,
            warnings,
            estimated_impact,
            snapshots: PlanSnapshots {
                source: source.into(),
                destination: destination.into(),
            },
            duration_ms: 0,
        }
    }

    /// True when there is nothing to apply ("already up to date").
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operation(&self, path: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.path == path)
    }

    /// Whether `other` would apply the same operations. Timings, warnings and
    /// snapshot details are not compared.
    pub fn same_changes(&self, other: &Plan) -> bool {
        self.direction == other.direction
            && self.operations == other.operations
            && self.blocked == other.blocked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Completed,
    Failed,
    Skipped,
}

/// What happened to one operation during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation: Operation,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationOutcome {
    pub fn completed(operation: Operation) -> Self {
        Self {
            operation,
            status: OperationStatus::Completed,
            error: None,
        }
    }

    pub fn failed(operation: Operation, error: impl Into<String>) -> Self {
        Self {
            operation,
            status: OperationStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn skipped(operation: Operation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            status: OperationStatus::Skipped,
            error: Some(reason.into()),
        }
    }
}

/// Result of applying a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// False if any operation failed
    pub success: bool,
    pub operations: Vec<OperationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupInfo>,
    pub rollback_available: bool,
    /// True if the run stopped early on a cancellation request
    pub cancelled: bool,
    pub warnings: Vec<String>,
}

impl ExecutionResult {
    pub fn count(&self, status: OperationStatus) -> usize {
        self.operations
            .iter()
            .filter(|o| o.status == status)
            .count()
    }

    pub fn outcome(&self, path: &str) -> Option<&OperationOutcome> {
        self.operations.iter().find(|o| o.operation.path == path)
    }
}

/// Cooperative cancellation checked between operations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options shared by sync and push runs.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Compute and return the plan without touching disk
    pub dry_run: bool,
    pub conflict_strategy: ConflictStrategy,
    /// Allow delete operations to run
    pub confirm_delete: bool,
    /// Allow operations on dangerous paths to run
    pub allow_critical: bool,
    pub cancel: CancelFlag,
}

impl SyncOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}
