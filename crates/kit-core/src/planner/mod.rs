//! Pure three-way planners.
//!
//! Both planners take already-captured snapshots and a baseline and return a
//! [`Plan`](crate::Plan). They never touch the filesystem, so a dry run and a
//! real run compute the same plan.

pub mod push;
pub mod sync;

use std::collections::{BTreeMap, BTreeSet};

use kit_fs::Snapshot;

pub use push::{CandidateStatus, PushCandidate, PushPlanInput, plan_push, push_candidates};
pub use sync::{SyncPlanInput, plan_sync};

/// Sorted union of the paths in two snapshots and a baseline.
///
/// Paths that were unreadable on either side are left out: their content is
/// unknown, so no operation may be planned for them. The snapshot warnings
/// already report them.
fn path_union<'a>(
    a: &'a Snapshot,
    b: &'a Snapshot,
    baseline: &'a BTreeMap<String, String>,
) -> BTreeSet<&'a str> {
    a.paths()
        .chain(b.paths())
        .chain(baseline.keys().map(String::as_str))
        .filter(|path| !a.is_unreadable(path) && !b.is_unreadable(path))
        .collect()
}
