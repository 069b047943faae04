//! Computing the baselines persisted after a run.
//!
//! Baselines only ever describe what is known to be true on disk after
//! execution. Paths whose operation was skipped or failed keep their previous
//! entry, so the next run sees the same divergence again instead of silently
//! adopting it.

use std::collections::BTreeMap;

use chrono::Utc;
use kit_fs::Snapshot;
use tracing::debug;

use crate::config::Profile;
use crate::metadata::{LastOperations, PushBaseline, SyncBaseline};
use crate::model::{Action, Operation, OperationOutcome, OperationStatus, PlanSummary};

/// Derives the next sync and push baselines from an execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineManager;

fn completed(outcomes: &[OperationOutcome]) -> impl Iterator<Item = &Operation> {
    outcomes
        .iter()
        .filter(|o| o.status == OperationStatus::Completed)
        .map(|o| &o.operation)
}

impl BaselineManager {
    /// The sync baseline after a sync run.
    ///
    /// Paths where source and destination now agree are recorded with that
    /// hash. Completed writes take the post-execution destination hash and
    /// completed deletes are dropped. Paths outside the profile, and files that
    /// only ever existed in the destination, are never recorded. Paths that
    /// could not be read on either side keep their previous entry.
    pub fn next_sync(
        previous: Option<&SyncBaseline>,
        source: &Snapshot,
        dest_after: &Snapshot,
        profile: &Profile,
        outcomes: &[OperationOutcome],
    ) -> SyncBaseline {
        let mut hashes: BTreeMap<String, String> = previous
            .map(|b| b.hashes().clone())
            .unwrap_or_default();

        // Gone from both sides: nothing left to remember
        hashes.retain(|path, _| {
            let unknown = source.is_unreadable(path) || dest_after.is_unreadable(path);
            profile.contains(path) && (unknown || source.contains(path) || dest_after.contains(path))
        });

        let in_profile = source.restrict(|path| profile.contains(path));
        for (path, record) in in_profile.files() {
            if dest_after.hash_of(path) == Some(record.hash.as_str()) {
                hashes.insert(path.clone(), record.hash.clone());
            }
        }

        for op in completed(outcomes) {
            match op.action {
                Action::Create | Action::Update => {
                    if let Some(hash) = dest_after.hash_of(&op.path) {
                        hashes.insert(op.path.clone(), hash.to_string());
                    }
                }
                Action::Delete => {
                    hashes.remove(&op.path);
                }
            }
        }

        debug!(files = hashes.len(), "Computed sync baseline");
        SyncBaseline::new(hashes)
    }

    /// The push baseline after a push run.
    ///
    /// Only paths actually pushed, or resolved by keeping the source version,
    /// change. Every other entry is carried over untouched.
    pub fn next_push(
        previous: Option<&PushBaseline>,
        target_after: &Snapshot,
        outcomes: &[OperationOutcome],
        resolved: &[Operation],
        summary: PlanSummary,
    ) -> PushBaseline {
        let mut hashes: BTreeMap<String, String> = previous
            .map(|b| b.hashes().clone())
            .unwrap_or_default();

        let mut touched = 0;
        for op in completed(outcomes).chain(resolved.iter()) {
            touched += 1;
            match (op.action, target_after.hash_of(&op.path)) {
                (Action::Create | Action::Update, Some(hash)) => {
                    hashes.insert(op.path.clone(), hash.to_string());
                }
                _ => {
                    hashes.remove(&op.path);
                }
            }
        }

        debug!(files = hashes.len(), touched, "Computed push baseline");
        PushBaseline::new(
            hashes,
            Some(LastOperations {
                timestamp: Utc::now(),
                operation_count: touched,
                summary,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PathPatterns;
    use kit_fs::FileRecord;
    use pretty_assertions::assert_eq;

    fn snap(files: &[(&str, &str)]) -> Snapshot {
        Snapshot::new(
            "/tree",
            files.iter().map(|(p, h)| FileRecord::new(*p, *h, 1)),
            Vec::new(),
        )
    }

    fn hashes(files: &[(&str, &str)]) -> BTreeMap<String, String> {
        files
            .iter()
            .map(|(p, h)| (p.to_string(), h.to_string()))
            .collect()
    }

    #[test]
    fn sync_records_agreeing_paths_only() {
        let source = snap(&[("a", "1"), ("b", "2")]);
        let dest = snap(&[("a", "1"), ("b", "local"), ("mine", "x")]);

        let next = BaselineManager::next_sync(None, &source, &dest, &Profile::all("full"), &[]);

        assert_eq!(next.hashes(), &hashes(&[("a", "1")]));
    }

    #[test]
    fn sync_keeps_previous_entry_for_skipped_conflict() {
        let previous = SyncBaseline::new(hashes(&[("a", "H0")]));
        let source = snap(&[("a", "H0")]);
        let dest = snap(&[("a", "H1")]);
        let skipped = OperationOutcome::skipped(
            Operation::new("a", Action::Update, 1),
            "conflict",
        );

        let next =
            BaselineManager::next_sync(Some(&previous), &source, &dest, &Profile::all("full"), &[skipped]);

        assert_eq!(next.hashes(), &hashes(&[("a", "H0")]));
    }

    #[test]
    fn sync_drops_completed_deletes_and_out_of_profile_paths() {
        let previous = SyncBaseline::new(hashes(&[("commands/a", "1"), ("templates/t", "2")]));
        let source = snap(&[("templates/t", "2")]);
        let dest = snap(&[("templates/t", "2")]);
        let deleted = OperationOutcome::completed(Operation::new("commands/a", Action::Delete, 0));
        let profile = Profile::new("minimal", PathPatterns::new(["commands"]).unwrap());

        let next = BaselineManager::next_sync(Some(&previous), &source, &dest, &profile, &[deleted]);

        assert!(next.hashes().is_empty());
    }

    #[test]
    fn sync_keeps_entry_for_unreadable_path() {
        let previous = SyncBaseline::new(hashes(&[("commands/a", "H0")]));
        let source = snap(&[]).with_unreadable(["commands/a".to_string()]);
        let dest = snap(&[]).with_unreadable(["commands".to_string()]);

        let next =
            BaselineManager::next_sync(Some(&previous), &source, &dest, &Profile::all("full"), &[]);

        assert_eq!(next.hashes(), &hashes(&[("commands/a", "H0")]));
    }

    #[test]
    fn push_updates_only_touched_paths() {
        let previous = PushBaseline::new(hashes(&[("commands/old", "o"), ("commands/gone", "g")]), None);
        let target = snap(&[("commands/new", "n"), ("commands/old", "o2")]);
        let outcomes = vec![
            OperationOutcome::completed(Operation::new("commands/new", Action::Create, 1)),
            OperationOutcome::completed(Operation::new("commands/gone", Action::Delete, 0)),
            OperationOutcome::skipped(Operation::new("commands/old", Action::Update, 1), "conflict"),
        ];

        let next = BaselineManager::next_push(
            Some(&previous),
            &target,
            &outcomes,
            &[],
            PlanSummary::default(),
        );

        assert_eq!(
            next.hashes(),
            &hashes(&[("commands/new", "n"), ("commands/old", "o")])
        );
        assert_eq!(next.last_operations.as_ref().map(|l| l.operation_count), Some(2));
    }

    #[test]
    fn push_keep_source_marks_path_resolved() {
        let target = snap(&[("commands/a", "T")]);
        let resolved = vec![Operation::new("commands/a", Action::Update, 1)];

        let next =
            BaselineManager::next_push(None, &target, &[], &resolved, PlanSummary::default());

        assert_eq!(next.hashes(), &hashes(&[("commands/a", "T")]));
    }
}
