//! Property tests for planner and executor invariants

use std::collections::BTreeMap;

use kit_core::planner::{PushPlanInput, SyncPlanInput};
use kit_core::{
    Action, PathPatterns, Profile, SafetyClassifier, SelectionFilter, SyncEngine, SyncOptions,
    plan_push, plan_sync,
};
use kit_fs::{FileRecord, Snapshot};
use kit_test_utils::TestKit;
use proptest::prelude::*;

const PATHS: &[&str] = &[
    "a.md",
    "commands/b.md",
    "commands/nested/c.md",
    "hooks/pre.sh",
    "settings.json",
];

type Tree = BTreeMap<String, u8>;

/// Up to one of three content versions per known path.
fn tree() -> impl Strategy<Value = Tree> {
    prop::collection::vec(prop::option::of(0u8..3), PATHS.len()).prop_map(|versions| {
        PATHS
            .iter()
            .zip(versions)
            .filter_map(|(path, v)| v.map(|v| (path.to_string(), v)))
            .collect()
    })
}

fn hash(version: u8) -> String {
    format!("{:064x}", version)
}

fn snapshot(root: &str, tree: &Tree) -> Snapshot {
    Snapshot::new(
        root,
        tree.iter().map(|(p, v)| FileRecord::new(p.clone(), hash(*v), 1)),
        Vec::new(),
    )
}

fn hashes(tree: &Tree) -> BTreeMap<String, String> {
    tree.iter().map(|(p, v)| (p.clone(), hash(*v))).collect()
}

proptest! {
    #[test]
    fn sync_plan_respects_invariants(source in tree(), dest in tree(), base in tree()) {
        let baseline = hashes(&base);
        let plan = plan_sync(SyncPlanInput {
            source: &snapshot("/src", &source),
            dest: &snapshot("/dst", &dest),
            baseline: &baseline,
            profile: &Profile::all("full"),
            classifier: &SafetyClassifier::default(),
        });

        let paths: Vec<&str> = plan.operations.iter().map(|op| op.path.as_str()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(&paths, &sorted);
        prop_assert_eq!(plan.summary.total, plan.operations.len());
        prop_assert_eq!(
            plan.summary.conflict,
            plan.operations.iter().filter(|op| op.conflict.is_some()).count()
        );

        for op in &plan.operations {
            prop_assert_ne!(source.get(&op.path), dest.get(&op.path));
            if op.action == Action::Delete {
                // Only files that were synced before may go
                prop_assert!(base.contains_key(&op.path));
                prop_assert!(!source.contains_key(&op.path));
                if op.conflict.is_none() {
                    prop_assert_eq!(dest.get(&op.path), base.get(&op.path));
                }
            }
            if op.action == Action::Update && op.conflict.is_none() {
                prop_assert_eq!(dest.get(&op.path), base.get(&op.path));
            }
        }
    }

    #[test]
    fn push_plan_stays_inside_allow_list(target in tree(), source in tree(), base in tree()) {
        let baseline = hashes(&base);
        let pushable = PathPatterns::new(["commands", "hooks"]).unwrap();
        let plan = plan_push(PushPlanInput {
            target: &snapshot("/dst", &target),
            source: &snapshot("/src", &source),
            baseline: &baseline,
            pushable: &pushable,
            selection: &SelectionFilter::all(),
            classifier: &SafetyClassifier::default(),
            allow_critical: false,
        });

        for op in plan.operations.iter().chain(plan.blocked.iter()) {
            prop_assert!(pushable.matches(&op.path));
            prop_assert_ne!(target.get(&op.path), source.get(&op.path));
        }
        prop_assert!(plan.operations.iter().all(|op| !op.is_dangerous()));
        prop_assert!(plan.blocked.iter().all(|op| op.is_dangerous()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Before any sync has happened nothing in the destination is deleted,
    /// however permissive the options.
    #[test]
    fn first_sync_never_deletes_local_files(source in tree(), dest in tree()) {
        let kit = TestKit::new("full");
        for (path, v) in &source {
            kit.write_source(path, &format!("v{}", v));
        }
        for (path, v) in &dest {
            kit.write_dest(path, &format!("v{}", v));
        }

        let options = SyncOptions {
            confirm_delete: true,
            allow_critical: true,
            ..SyncOptions::default()
        };
        SyncEngine::open(kit.dest()).unwrap().sync(&options).unwrap();

        for (path, v) in &dest {
            // Conflicts are skipped, so local content survives as well
            kit.assert_dest_content(path, &format!("v{}", v));
        }
        for (path, v) in &source {
            if !dest.contains_key(path) {
                kit.assert_dest_content(path, &format!("v{}", v));
            }
        }
    }
}
