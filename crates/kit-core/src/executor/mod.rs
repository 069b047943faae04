//! Applying plans to disk.
//!
//! Both executors follow the same shape: decide which operations may run,
//! back up every path they touch, apply the operations one at a time, then
//! re-hash and persist the baseline. A failing operation is
//! recorded and the loop moves on.

pub mod push;
pub mod sync;

use std::path::Path;

use kit_fs::io::{RobustnessConfig, copy_atomic, remove_file_and_prune};
use kit_fs::validate_relative;
use tracing::{debug, warn};

use crate::model::{
    Action, CancelFlag, ConflictStrategy, Operation, OperationOutcome, Plan, SyncOptions,
};

pub use push::PushExecutor;
pub use sync::SyncExecutor;

pub(crate) const CONFIRMATION_REQUIRED: &str = "confirmation required";

/// Operations sorted into what will run and what will not.
#[derive(Debug, Default)]
struct Triage {
    run: Vec<Operation>,
    skipped: Vec<OperationOutcome>,
    /// Conflicts settled without writing (`keep_source`)
    resolved: Vec<Operation>,
    warnings: Vec<String>,
}

impl Triage {
    fn skip(&mut self, op: &Operation, reason: String, warn_user: bool) {
        if warn_user {
            self.warnings.push(format!("Skipped {}: {}", op.path, reason));
        }
        self.skipped.push(OperationOutcome::skipped(op.clone(), reason));
    }
}

fn triage(plan: &Plan, options: &SyncOptions) -> Triage {
    let mut triage = Triage::default();

    for op in &plan.blocked {
        triage.skip(
            op,
            format!("{}: dangerous path, pass --allow-critical", CONFIRMATION_REQUIRED),
            false,
        );
    }

    for op in &plan.operations {
        if let Some(conflict) = op.conflict {
            match options.conflict_strategy {
                ConflictStrategy::Skip => {
                    triage.skip(op, format!("conflict: {}", conflict), false);
                    continue;
                }
                ConflictStrategy::KeepSource => {
                    triage.resolved.push(op.clone());
                    triage.skipped.push(OperationOutcome::skipped(
                        op.clone(),
                        "conflict resolved: kept source version",
                    ));
                    continue;
                }
                ConflictStrategy::ForcePush => {}
            }
        }
        if op.action == Action::Delete && !options.confirm_delete {
            triage.skip(
                op,
                "delete not confirmed (pass --confirm)".to_string(),
                true,
            );
            continue;
        }
        if op.is_dangerous() && !options.allow_critical {
            triage.skip(
                op,
                format!("{}: dangerous path, pass --allow-critical", CONFIRMATION_REQUIRED),
                true,
            );
            continue;
        }
        triage.run.push(op.clone());
    }

    triage.run = order(std::mem::take(&mut triage.run));
    triage
}

/// Whether `dir` is a strict ancestor directory of `path`.
fn is_ancestor(dir: &str, path: &str) -> bool {
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

/// Writes in path order, then deletes deepest first.
///
/// A delete that frees a path some write needs runs before the writes. That
/// happens when a path turns from a file into a directory (`foo` becomes
/// `foo/bar.md`) or back.
fn order(ops: Vec<Operation>) -> Vec<Operation> {
    let (mut writes, deletes): (Vec<_>, Vec<_>) =
        ops.into_iter().partition(|op| op.action != Action::Delete);
    writes.sort_by(|a, b| a.path.cmp(&b.path));

    let (mut early, mut late): (Vec<_>, Vec<_>) = deletes.into_iter().partition(|delete| {
        writes.iter().any(|write| {
            is_ancestor(&delete.path, &write.path) || is_ancestor(&write.path, &delete.path)
        })
    });
    let deepest_first = |a: &Operation, b: &Operation| {
        let depth = |op: &Operation| op.path.matches('/').count();
        depth(b).cmp(&depth(a)).then_with(|| a.path.cmp(&b.path))
    };
    early.sort_by(deepest_first);
    late.sort_by(deepest_first);

    early.extend(writes);
    early.extend(late);
    early
}

fn apply_one(
    op: &Operation,
    from: &Path,
    to: &Path,
    robustness: RobustnessConfig,
) -> kit_fs::Result<()> {
    let key = validate_relative(&op.path)?;
    let target = to.join(&key);
    match op.action {
        Action::Create | Action::Update => {
            copy_atomic(&from.join(&key), &target, robustness)?;
        }
        Action::Delete => {
            if target.is_file() {
                remove_file_and_prune(to, &target)?;
            } else {
                debug!(path = %key, "Already deleted");
            }
        }
    }
    Ok(())
}

/// Apply `ops` in order, checking for cancellation between operations.
///
/// Returns the outcomes and whether the loop was cancelled.
fn apply_all(
    ops: Vec<Operation>,
    from: &Path,
    to: &Path,
    cancel: &CancelFlag,
    robustness: RobustnessConfig,
) -> (Vec<OperationOutcome>, bool) {
    let mut outcomes = Vec::with_capacity(ops.len());
    let mut cancelled = false;

    for op in ops {
        if cancelled || cancel.is_cancelled() {
            cancelled = true;
            outcomes.push(OperationOutcome::skipped(op, "cancelled"));
            continue;
        }
        match apply_one(&op, from, to, robustness) {
            Ok(()) => {
                debug!(path = %op.path, action = %op.action, "Applied");
                outcomes.push(OperationOutcome::completed(op));
            }
            Err(e) => {
                warn!(path = %op.path, action = %op.action, error = %e, "Operation failed");
                outcomes.push(OperationOutcome::failed(op, e.to_string()));
            }
        }
    }
    (outcomes, cancelled)
}
