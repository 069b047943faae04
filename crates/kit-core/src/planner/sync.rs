//! Source to destination planning.

use std::collections::BTreeMap;
use std::time::Instant;

use kit_fs::Snapshot;
use tracing::debug;

use super::path_union;
use crate::config::Profile;
use crate::model::{Action, ConflictType, Direction, Operation, Plan};
use crate::safety::SafetyClassifier;

/// Everything the sync planner reads.
#[derive(Debug, Clone, Copy)]
pub struct SyncPlanInput<'a> {
    pub source: &'a Snapshot,
    pub dest: &'a Snapshot,
    /// Sync baseline hashes; empty when no sync has happened yet
    pub baseline: &'a BTreeMap<String, String>,
    pub profile: &'a Profile,
    pub classifier: &'a SafetyClassifier,
}

/// Classify one path from its source, destination and baseline hashes.
fn classify(
    source: Option<&str>,
    dest: Option<&str>,
    base: Option<&str>,
) -> Option<(Action, Option<ConflictType>)> {
    match (source, dest) {
        (Some(_), None) => Some((Action::Create, None)),
        (Some(s), Some(d)) if s == d => None,
        (Some(s), Some(d)) => {
            let conflict = match base {
                Some(b) if b == d => None,
                Some(b) if b == s => Some(ConflictType::LocalModified),
                Some(_) => Some(ConflictType::BothModified),
                None => Some(ConflictType::NoBaseline),
            };
            Some((Action::Update, conflict))
        }
        (None, Some(d)) => match base {
            Some(b) if b == d => Some((Action::Delete, None)),
            Some(_) => Some((Action::Delete, Some(ConflictType::ModifiedDeleted))),
            // Never synced: the file belongs to the user
            None => None,
        },
        (None, None) => None,
    }
}

/// Compute the plan that brings the destination in line with the source.
///
/// Paths outside the profile are ignored entirely. Files only the user has
/// created in the destination are never touched.
pub fn plan_sync(input: SyncPlanInput<'_>) -> Plan {
    let started = Instant::now();
    let mut operations = Vec::new();

    for path in path_union(input.source, input.dest, input.baseline) {
        if !input.profile.contains(path) {
            continue;
        }
        let source = input.source.get(path);
        let dest = input.dest.hash_of(path);
        let base = input.baseline.get(path).map(String::as_str);

        let Some((action, conflict)) = classify(source.map(|r| r.hash.as_str()), dest, base)
        else {
            continue;
        };

        let size = match action {
            Action::Delete => 0,
            _ => source.map(|r| r.size).unwrap_or_default(),
        };
        let mut op = Operation::new(path, action, size).with_safety(input.classifier.classify(path));
        if let Some(conflict) = conflict {
            op = op.with_conflict(conflict);
        }
        operations.push(op);
    }

    let mut warnings: Vec<String> = input.source.warnings().to_vec();
    warnings.extend(input.dest.warnings().iter().cloned());

    let mut plan = Plan::assemble(
        Direction::SourceToDest,
        input.source,
        input.dest,
        operations,
        Vec::new(),
        warnings,
    );
    plan.duration_ms = started.elapsed().as_millis() as u64;

    debug!(
        profile = input.profile.name(),
        operations = plan.summary.total,
        conflicts = plan.summary.conflict,
        "Planned sync"
    );
    plan
}
