//! Destination to source planning.
//!
//! Push diffs the destination (the *target* of earlier syncs) against the
//! source package using the push baseline, so files that were just brought
//! down by a sync are not reported as local changes.

use std::collections::BTreeMap;
use std::time::Instant;

use kit_fs::Snapshot;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::path_union;
use crate::model::{Action, ConflictType, Direction, Operation, Plan, Safety};
use crate::patterns::PathPatterns;
use crate::safety::SafetyClassifier;
use crate::selection::SelectionFilter;

/// Everything the push planner reads.
#[derive(Debug, Clone, Copy)]
pub struct PushPlanInput<'a> {
    /// The destination tree, where local edits were made
    pub target: &'a Snapshot,
    /// The shared source package
    pub source: &'a Snapshot,
    /// Push baseline hashes; empty when nothing was ever pushed
    pub baseline: &'a BTreeMap<String, String>,
    pub pushable: &'a PathPatterns,
    pub selection: &'a SelectionFilter,
    pub classifier: &'a SafetyClassifier,
    /// Keep dangerous operations executable instead of blocking them
    pub allow_critical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    New,
    Modified,
    Deleted,
}

/// A pushable path with a local change, offered to the selection step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushCandidate {
    pub path: String,
    pub status: CandidateStatus,
    pub safety: Safety,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictType>,
    pub size: u64,
}

impl From<&Operation> for PushCandidate {
    fn from(op: &Operation) -> Self {
        Self {
            path: op.path.clone(),
            status: match op.action {
                Action::Create => CandidateStatus::New,
                Action::Update => CandidateStatus::Modified,
                Action::Delete => CandidateStatus::Deleted,
            },
            safety: op.safety,
            conflict: op.conflict,
            size: op.size,
        }
    }
}

fn classify(
    target: Option<&str>,
    source: Option<&str>,
    base: Option<&str>,
) -> Option<(Action, Option<ConflictType>)> {
    match (target, source) {
        (Some(t), None) => match base {
            // Removed from the source after our last push
            Some(b) if b == t => None,
            Some(_) => Some((Action::Create, Some(ConflictType::ModifiedDeleted))),
            None => Some((Action::Create, None)),
        },
        (Some(t), Some(s)) if t == s => None,
        (Some(t), Some(s)) => match base {
            // Only the source moved on; that is for sync to bring down
            Some(b) if b == t => None,
            Some(b) if b == s => Some((Action::Update, None)),
            Some(_) => Some((Action::Update, Some(ConflictType::BothModified))),
            None => Some((Action::Update, Some(ConflictType::NoBaseline))),
        },
        (None, Some(s)) => match base {
            Some(b) if b == s => Some((Action::Delete, None)),
            Some(_) => Some((Action::Delete, Some(ConflictType::ModifiedDeleted))),
            None => None,
        },
        (None, None) => None,
    }
}

fn diff(
    target: &Snapshot,
    source: &Snapshot,
    baseline: &BTreeMap<String, String>,
    classifier: &SafetyClassifier,
    accept: impl Fn(&str) -> bool,
) -> Vec<Operation> {
    let mut operations = Vec::new();
    for path in path_union(target, source, baseline) {
        if !accept(path) {
            continue;
        }
        let record = target.get(path);
        let Some((action, conflict)) = classify(
            record.map(|r| r.hash.as_str()),
            source.hash_of(path),
            baseline.get(path).map(String::as_str),
        ) else {
            continue;
        };
        let size = match action {
            Action::Delete => 0,
            _ => record.map(|r| r.size).unwrap_or_default(),
        };
        let mut op = Operation::new(path, action, size).with_safety(classifier.classify(path));
        if let Some(conflict) = conflict {
            op = op.with_conflict(conflict);
        }
        operations.push(op);
    }
    operations
}

/// List pushable paths with local changes, before any selection is applied.
pub fn push_candidates(
    target: &Snapshot,
    source: &Snapshot,
    baseline: &BTreeMap<String, String>,
    pushable: &PathPatterns,
    classifier: &SafetyClassifier,
) -> Vec<PushCandidate> {
    diff(target, source, baseline, classifier, |path| {
        pushable.matches(path)
    })
    .iter()
    .map(PushCandidate::from)
    .collect()
}

/// Compute the plan that carries local destination changes back to the source.
///
/// Only paths on the pushable allow-list that also pass the selection are
/// considered. Dangerous operations land in [`Plan::blocked`] unless
/// `allow_critical` is set.
pub fn plan_push(input: PushPlanInput<'_>) -> Plan {
    let started = Instant::now();
    let candidates = diff(
        input.target,
        input.source,
        input.baseline,
        input.classifier,
        |path| input.pushable.matches(path) && input.selection.accepts(path),
    );

    let mut warnings: Vec<String> = input.target.warnings().to_vec();
    warnings.extend(input.source.warnings().iter().cloned());
    warnings.extend(input.selection.warnings().iter().cloned());

    let (operations, blocked): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|op| input.allow_critical || !op.is_dangerous());
    for op in &blocked {
        warnings.push(format!(
            "Skipping dangerous path {} (confirmation required: pass --allow-critical)",
            op.path
        ));
    }

    let mut plan = Plan::assemble(
        Direction::TargetToSource,
        input.target,
        input.source,
        operations,
        blocked,
        warnings,
    );
    plan.duration_ms = started.elapsed().as_millis() as u64;

    debug!(
        operations = plan.summary.total,
        blocked = plan.blocked.len(),
        conflicts = plan.summary.conflict,
        "Planned push"
    );
    plan
}
