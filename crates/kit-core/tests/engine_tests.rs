//! Engine behaviour against real directories

use std::fs;

use kit_core::{
    AllSelection, Error, PatternSelection, PushCandidate, Result, SelectionProvider, SelectionSet,
    SyncEngine, SyncOptions,
};
use kit_test_utils::TestKit;
use rstest::rstest;

fn open_error(kit: &TestKit) -> Error {
    match SyncEngine::open(kit.dest()) {
        Ok(_) => panic!("expected the engine to refuse this kit"),
        Err(e) => e,
    }
}

#[test]
fn missing_install_metadata_is_an_environment_error() {
    let kit = TestKit::new("full");
    fs::remove_file(kit.dest().join(".kitsync/install.json")).unwrap();

    let err = open_error(&kit);
    assert!(err.is_environment());
    assert!(err.to_string().contains("No kit installed"));
}

#[test]
fn missing_source_is_an_environment_error() {
    let kit = TestKit::new("full");
    fs::remove_dir_all(kit.source()).unwrap();

    let err = open_error(&kit);
    assert!(err.is_environment());
    assert!(err.to_string().contains("Source package not found"));
}

#[test]
fn unknown_profile_is_an_environment_error() {
    let kit = TestKit::new("everything-and-more");
    let err = open_error(&kit);
    assert!(err.is_environment());
    assert!(err.to_string().contains("everything-and-more"));
}

#[test]
fn source_pointing_at_destination_is_refused() {
    let kit = TestKit::new("full");
    fs::write(
        kit.dest().join(".kitsync/install.json"),
        r#"{ "sourcePath": ".", "profile": "full" }"#,
    )
    .unwrap();

    let err = open_error(&kit);
    assert!(err.to_string().contains("same directory"));
}

#[test]
fn relative_source_path_resolves_against_destination() {
    let kit = TestKit::new("full");
    fs::write(
        kit.dest().join(".kitsync/install.json"),
        r#"{ "sourcePath": "../source", "profile": "full" }"#,
    )
    .unwrap();

    let engine = SyncEngine::open(kit.dest()).unwrap();
    assert_eq!(
        engine.source(),
        dunce::canonicalize(kit.source()).unwrap().as_path()
    );
}

#[test]
fn invalid_config_pattern_is_rejected() {
    let kit = TestKit::new("full");
    kit.write_config("pushable = [\"commands/[\"]\n");

    let err = open_error(&kit);
    assert!(matches!(err, Error::Config { .. }));
}

#[test]
fn config_profiles_and_pushable_are_honoured() {
    let kit = TestKit::new("docs");
    kit.write_config(
        r#"
pushable = ["docs"]

[profiles.docs]
include = ["docs"]
"#,
    );
    kit.write_source("docs/guide.md", "guide");
    kit.write_source("commands/a.md", "a");
    kit.write_dest("docs/local.md", "local");
    kit.write_dest("commands/mine.md", "mine");

    let engine = SyncEngine::open(kit.dest()).unwrap();
    let plan = engine.plan_sync().unwrap();
    let paths: Vec<&str> = plan.operations.iter().map(|op| op.path.as_str()).collect();
    assert_eq!(paths, vec!["docs/guide.md"]);

    let candidates: Vec<String> = engine
        .push_candidates()
        .unwrap()
        .into_iter()
        .map(|c| c.path)
        .collect();
    assert_eq!(candidates, vec!["docs/local.md".to_string()]);
}

#[rstest]
#[case::force_push("force_push")]
#[case::keep_source("keep_source")]
fn sync_rejects_push_only_strategies(#[case] strategy: &str) {
    let kit = TestKit::new("full");
    let options = SyncOptions {
        conflict_strategy: strategy.parse().unwrap(),
        ..SyncOptions::dry_run()
    };

    let err = SyncEngine::open(kit.dest()).unwrap().sync(&options).unwrap_err();
    assert!(matches!(err, Error::InvalidStrategy { .. }));
}

/// Records what it was offered and selects everything.
struct Recording(std::cell::RefCell<Option<Vec<PushCandidate>>>);

impl SelectionProvider for Recording {
    fn select(&self, candidates: &[PushCandidate]) -> Result<SelectionSet> {
        *self.0.borrow_mut() = Some(candidates.to_vec());
        Ok(SelectionSet::all())
    }
}

#[test]
fn provider_is_not_consulted_without_candidates() {
    let kit = TestKit::new("full");
    let provider = Recording(Default::default());

    let report = SyncEngine::open(kit.dest())
        .unwrap()
        .push(&SyncOptions::default(), &provider)
        .unwrap();

    assert!(report.plan.is_empty());
    assert!(provider.0.borrow().is_none());
}

#[test]
fn provider_sees_pushable_candidates() {
    let kit = TestKit::new("full");
    kit.write_dest("commands/a.md", "a");
    kit.write_dest("private.md", "p");
    let provider = Recording(Default::default());

    SyncEngine::open(kit.dest())
        .unwrap()
        .push(&SyncOptions::dry_run(), &provider)
        .unwrap();

    let offered = provider.0.borrow();
    let offered: Vec<&str> = offered
        .as_ref()
        .unwrap()
        .iter()
        .map(|c| c.path.as_str())
        .collect();
    assert_eq!(offered, vec!["commands/a.md"]);
}

#[test]
fn git_detection_limits_push_to_changed_files() {
    let kit = TestKit::new("full");
    kit.write_dest("commands/a.md", "a");
    kit.write_dest("commands/b.md", "b");
    kit.init_dest_git();
    kit.write_dest("commands/a.md", "a, edited");

    let selection = PatternSelection::new(SelectionSet {
        use_git_detection: true,
        ..SelectionSet::all()
    });
    SyncEngine::open(kit.dest())
        .unwrap()
        .push(&SyncOptions::default(), &selection)
        .unwrap();

    kit.assert_source_content("commands/a.md", "a, edited");
    kit.assert_source_missing("commands/b.md");
}

#[test]
fn backups_are_pruned_to_retention() {
    let kit = TestKit::new("full");
    kit.write_config("backup_retention = 2\n");

    for version in 0..4 {
        kit.write_source("commands/a.md", &format!("v{}", version));
        SyncEngine::open(kit.dest())
            .unwrap()
            .sync(&SyncOptions::default())
            .unwrap();
    }

    let backups = SyncEngine::open(kit.dest()).unwrap().backups().unwrap();
    assert_eq!(backups.len(), 2);
}

#[test]
fn rollback_of_unknown_backup_fails() {
    let kit = TestKit::new("full");
    let err = SyncEngine::open(kit.dest())
        .unwrap()
        .rollback("sync-20240101_000000-0")
        .unwrap_err();
    assert!(matches!(err, Error::BackupNotFound { .. }));
}

#[test]
fn all_selection_pushes_every_candidate() {
    let kit = TestKit::new("full");
    kit.write_dest("commands/a.md", "a");
    kit.write_dest("agents/b.md", "b");

    let report = SyncEngine::open(kit.dest())
        .unwrap()
        .push(&SyncOptions::default(), &AllSelection)
        .unwrap();

    assert!(report.result.unwrap().success);
    kit.assert_source_content("commands/a.md", "a");
    kit.assert_source_content("agents/b.md", "b");
}

fn confirmed() -> SyncOptions {
    SyncOptions {
        confirm_delete: true,
        ..SyncOptions::default()
    }
}

#[test]
fn file_turned_directory_syncs_in_one_run() {
    let kit = TestKit::new("full");
    kit.write_source("commands/foo", "file");
    SyncEngine::open(kit.dest()).unwrap().sync(&confirmed()).unwrap();

    kit.remove_source("commands/foo");
    kit.write_source("commands/foo/bar.md", "nested");
    let report = SyncEngine::open(kit.dest()).unwrap().sync(&confirmed()).unwrap();

    assert!(report.result.unwrap().success);
    kit.assert_dest_content("commands/foo/bar.md", "nested");
}

#[test]
fn directory_turned_file_syncs_in_one_run() {
    let kit = TestKit::new("full");
    kit.write_source("commands/foo/bar.md", "nested");
    SyncEngine::open(kit.dest()).unwrap().sync(&confirmed()).unwrap();

    fs::remove_dir_all(kit.source().join("commands/foo")).unwrap();
    kit.write_source("commands/foo", "file");
    let report = SyncEngine::open(kit.dest()).unwrap().sync(&confirmed()).unwrap();

    assert!(report.result.unwrap().success);
    kit.assert_dest_content("commands/foo", "file");
}

#[cfg(unix)]
#[test]
fn synced_scripts_stay_executable() {
    use std::os::unix::fs::PermissionsExt;

    let kit = TestKit::new("full");
    kit.write_source("scripts/run.sh", "#!/bin/sh\n");
    fs::set_permissions(
        kit.source().join("scripts/run.sh"),
        fs::Permissions::from_mode(0o755),
    )
    .unwrap();

    let report = SyncEngine::open(kit.dest()).unwrap().sync(&SyncOptions::default()).unwrap();

    assert!(report.result.unwrap().success);
    let mode = fs::metadata(kit.dest().join("scripts/run.sh"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[test]
fn approved_sync_runs_when_nothing_changed() {
    let kit = TestKit::new("full");
    kit.write_source("commands/a.md", "a");
    let engine = SyncEngine::open(kit.dest()).unwrap();

    let preview = engine.sync(&SyncOptions::dry_run()).unwrap();
    let report = engine
        .sync_approved(&SyncOptions::default(), &preview.plan)
        .unwrap();

    assert!(report.result.unwrap().success);
    kit.assert_dest_content("commands/a.md", "a");
}

#[test]
fn approved_sync_refuses_a_plan_that_changed() {
    let kit = TestKit::new("full");
    kit.write_source("commands/a.md", "a");
    let engine = SyncEngine::open(kit.dest()).unwrap();
    let preview = engine.sync(&SyncOptions::dry_run()).unwrap();

    kit.write_source("commands/b.md", "b");
    let err = engine
        .sync_approved(&SyncOptions::default(), &preview.plan)
        .unwrap_err();

    assert!(matches!(err, Error::PlanChanged { .. }));
    kit.assert_dest_missing("commands/a.md");
    kit.assert_dest_missing("commands/b.md");
}

#[test]
fn approved_push_refuses_a_plan_that_changed() {
    let kit = TestKit::new("full");
    kit.write_dest("commands/a.md", "a");
    let engine = SyncEngine::open(kit.dest()).unwrap();
    let preview = engine.push(&SyncOptions::dry_run(), &AllSelection).unwrap();

    kit.write_dest("agents/b.md", "b");
    let err = engine
        .push_approved(&SyncOptions::default(), &AllSelection, &preview.plan)
        .unwrap_err();

    assert!(matches!(err, Error::PlanChanged { .. }));
    kit.assert_source_missing("commands/a.md");
}
