//! Sync and push working against the same kit
//!
//! Each test drives a real source package and installed destination through
//! the engine, the way the CLI does.

use std::fs;

use kit_core::{
    Action, AllSelection, ConflictStrategy, ConflictType, OperationStatus, PatternSelection,
    SelectionSet, SyncEngine, SyncOptions,
};
use kit_fs::FileHasher;
use kit_test_utils::TestKit;
use pretty_assertions::assert_eq;

fn engine(kit: &TestKit) -> SyncEngine {
    SyncEngine::open(kit.dest()).unwrap()
}

fn apply() -> SyncOptions {
    SyncOptions::default()
}

fn sync(kit: &TestKit, options: &SyncOptions) -> kit_core::RunReport {
    engine(kit).sync(options).unwrap()
}

fn push(kit: &TestKit, options: &SyncOptions) -> kit_core::RunReport {
    engine(kit).push(options, &AllSelection).unwrap()
}

#[test]
fn identical_files_are_not_planned() {
    let kit = TestKit::new("full");
    kit.write_source("a.md", "1");
    kit.write_source("b.md", "2");
    kit.write_dest("a.md", "1");

    let plan = engine(&kit).plan_sync().unwrap();

    let ops: Vec<(&str, Action)> = plan
        .operations
        .iter()
        .map(|op| (op.path.as_str(), op.action))
        .collect();
    assert_eq!(ops, vec![("b.md", Action::Create)]);
    assert_eq!(plan.summary.create, 1);
    assert_eq!(plan.summary.total, 1);
}

#[test]
fn local_edit_after_sync_is_a_conflict() {
    let kit = TestKit::new("full");
    kit.write_source("a.md", "v0");
    sync(&kit, &apply());
    kit.write_dest("a.md", "mine");

    let plan = engine(&kit).plan_sync().unwrap();

    assert_eq!(plan.conflicts.len(), 1);
    assert_eq!(plan.conflicts[0].path, "a.md");
    assert_eq!(plan.conflicts[0].conflict, Some(ConflictType::LocalModified));
}

#[test]
fn force_push_makes_both_sides_equal() {
    let kit = TestKit::new("full");
    kit.write_source("commands/a.md", "upstream");
    kit.write_dest("commands/a.md", "local");

    let options = SyncOptions {
        conflict_strategy: ConflictStrategy::ForcePush,
        ..apply()
    };
    let report = push(&kit, &options);
    assert_eq!(report.plan.conflicts.len(), 1);
    assert!(report.result.unwrap().success);

    let hasher = FileHasher::default();
    let source = hasher.snapshot(kit.source()).unwrap();
    let dest = hasher.snapshot(kit.dest()).unwrap();
    assert_eq!(
        source.hash_of("commands/a.md"),
        dest.hash_of("commands/a.md")
    );
}

#[test]
fn pushed_edit_reaches_a_fresh_destination() {
    let kit = TestKit::new("full");
    kit.write_dest("commands/mine.md", "written locally");
    push(&kit, &apply());

    // A second install of the same package
    let fresh = kit.root().join("fresh");
    fs::create_dir_all(fresh.join(".kitsync")).unwrap();
    fs::write(
        fresh.join(".kitsync/install.json"),
        format!(
            r#"{{ "sourcePath": {:?}, "profile": "full" }}"#,
            kit.source().display().to_string()
        ),
    )
    .unwrap();
    SyncEngine::open(&fresh).unwrap().sync(&apply()).unwrap();

    let hasher = FileHasher::default();
    assert_eq!(
        hasher.snapshot(&fresh).unwrap().hash_of("commands/mine.md"),
        hasher.snapshot(kit.dest()).unwrap().hash_of("commands/mine.md")
    );
}

#[test]
fn second_sync_is_up_to_date() {
    let kit = TestKit::new("full");
    kit.write_source("commands/a.md", "a");
    kit.write_source("agents/b.md", "b");
    kit.write_dest("notes.md", "local only");

    let first = sync(&kit, &apply());
    assert_eq!(first.plan.summary.create, 2);

    let second = sync(&kit, &apply());
    assert!(second.plan.is_empty());
}

#[test]
fn pushed_change_does_not_come_back_as_conflict() {
    let kit = TestKit::new("full");
    kit.write_source("commands/a.md", "v0");
    sync(&kit, &apply());

    // Nothing pushed yet, so the first divergence has no push baseline
    kit.write_dest("commands/a.md", "v1");
    let first = push(
        &kit,
        &SyncOptions {
            conflict_strategy: ConflictStrategy::ForcePush,
            ..apply()
        },
    );
    assert_eq!(
        first.plan.conflicts[0].conflict,
        Some(ConflictType::NoBaseline)
    );
    kit.assert_source_content("commands/a.md", "v1");

    // With a push baseline the next edit is a plain update
    kit.write_dest("commands/a.md", "v2");
    let second = push(&kit, &apply());
    assert!(second.plan.conflicts.is_empty());
    assert_eq!(
        second.result.unwrap().count(OperationStatus::Completed),
        1
    );
    kit.assert_source_content("commands/a.md", "v2");

    assert!(push(&kit, &apply()).plan.is_empty());
}

#[test]
fn synced_files_are_not_offered_for_push() {
    let kit = TestKit::new("full");
    kit.write_source("commands/a.md", "upstream");
    sync(&kit, &apply());

    assert!(engine(&kit).push_candidates().unwrap().is_empty());
}

#[test]
fn profile_limits_what_sync_brings_down() {
    let kit = TestKit::new("minimal");
    kit.write_source("commands/a.md", "a");
    kit.write_source("templates/t.md", "t");

    sync(&kit, &apply());

    kit.assert_dest_content("commands/a.md", "a");
    kit.assert_dest_missing("templates/t.md");
}

#[test]
fn dangerous_paths_wait_for_allow_critical() {
    let kit = TestKit::new("full");
    kit.write_source("settings.json", "{}");
    kit.write_source("commands/a.md", "a");

    let report = sync(&kit, &apply());
    let result = report.result.unwrap();
    assert_eq!(
        result.outcome("settings.json").map(|o| o.status),
        Some(OperationStatus::Skipped)
    );
    kit.assert_dest_missing("settings.json");
    kit.assert_dest_content("commands/a.md", "a");

    sync(
        &kit,
        &SyncOptions {
            allow_critical: true,
            ..apply()
        },
    );
    kit.assert_dest_content("settings.json", "{}");
}

#[test]
fn upstream_delete_needs_confirmation() {
    let kit = TestKit::new("full");
    kit.write_source("commands/old.md", "old");
    sync(&kit, &apply());
    kit.remove_source("commands/old.md");

    sync(&kit, &apply());
    kit.assert_dest_content("commands/old.md", "old");

    sync(
        &kit,
        &SyncOptions {
            confirm_delete: true,
            ..apply()
        },
    );
    kit.assert_dest_missing("commands/old.md");
}

#[test]
fn explicit_file_selection_limits_push() {
    let kit = TestKit::new("full");
    kit.write_dest("commands/a.md", "a");
    kit.write_dest("commands/b.md", "b");

    let selection = PatternSelection::new(SelectionSet {
        paths: vec!["commands/b.md".to_string()],
        ..SelectionSet::all()
    });
    engine(&kit).push(&apply(), &selection).unwrap();

    kit.assert_source_missing("commands/a.md");
    kit.assert_source_content("commands/b.md", "b");
}

#[test]
fn rollback_restores_previous_destination() {
    let kit = TestKit::new("full");
    kit.write_source("commands/a.md", "v1");
    sync(&kit, &apply());
    kit.write_source("commands/a.md", "v2");
    kit.write_source("commands/new.md", "new");
    let report = sync(&kit, &apply());
    let backup = report.result.unwrap().backup.unwrap();

    let restored = engine(&kit).rollback(&backup.id).unwrap();

    assert_eq!(restored.restored, vec!["commands/a.md".to_string()]);
    assert_eq!(restored.removed, vec!["commands/new.md".to_string()]);
    kit.assert_dest_content("commands/a.md", "v1");
    kit.assert_dest_missing("commands/new.md");
}

#[test]
fn dry_run_touches_nothing() {
    let kit = TestKit::new("full");
    kit.write_source("commands/a.md", "a");
    kit.write_dest("commands/mine.md", "mine");

    let sync_report = sync(&kit, &SyncOptions::dry_run());
    let push_report = push(&kit, &SyncOptions::dry_run());

    assert!(sync_report.result.is_none());
    assert!(push_report.result.is_none());
    kit.assert_dest_missing("commands/a.md");
    kit.assert_source_missing("commands/mine.md");
    assert!(!kit.dest().join(".kitsync/sync-baseline.json").exists());
    assert!(!kit.dest().join(".kitsync/backups").exists());
}
