//! Push command implementation

use std::path::Path;

use colored::Colorize;
use kit_core::{
    CancelFlag, PatternSelection, RunReport, SelectionProvider, SelectionSet, SyncEngine,
    SyncOptions,
};

use super::confirm;
use crate::cli::ApplyArgs;
use crate::error::{CliError, Result};
use crate::interactive::InteractiveSelection;
use crate::output::{print_json, print_plan, print_result};

/// Which files a push should consider
#[derive(Debug, Clone, Default)]
pub struct PushSelection {
    pub interactive: bool,
    pub files: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub git: bool,
}

impl PushSelection {
    fn set(&self) -> SelectionSet {
        SelectionSet {
            paths: self.files.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            use_git_detection: self.git,
        }
    }
}

/// Run the push command
pub fn run_push(
    dest: &Path,
    args: &ApplyArgs,
    selection: &PushSelection,
    cancel: CancelFlag,
) -> Result<()> {
    if selection.interactive && args.json {
        return Err(CliError::user("--interactive cannot be combined with --json"));
    }

    let engine = SyncEngine::open(dest)?;
    let options = args.options(cancel);

    // Interactive picks are made once and then reused for the real run.
    let chosen = if selection.interactive {
        let candidates = engine.push_candidates()?;
        if candidates.is_empty() {
            println!("{} Nothing to push", "=>".blue().bold());
            return Ok(());
        }
        InteractiveSelection::new(selection.git).select(&candidates)?
    } else {
        selection.set()
    };
    let provider = PatternSelection::new(chosen);

    if args.json {
        let report = engine.push(&options, &provider)?;
        print_json(&report)?;
        return finish(&report);
    }

    println!(
        "{} Pushing {} to {}",
        "=>".blue().bold(),
        engine.dest().display().to_string().cyan(),
        engine.source().display().to_string().cyan()
    );

    let preview = engine.push(
        &SyncOptions {
            dry_run: true,
            ..options.clone()
        },
        &provider,
    )?;
    print_plan(&preview.plan);

    if options.dry_run || (preview.plan.is_empty() && preview.plan.blocked.is_empty()) {
        if options.dry_run {
            println!("{} Dry run, nothing changed", "=>".blue().bold());
        }
        return Ok(());
    }
    if !confirm("Push these changes to the source package?", args.force)? {
        println!("Aborted");
        return Ok(());
    }

    let report = engine.push_approved(&options, &provider, &preview.plan)?;
    if let Some(result) = &report.result {
        print_result(result);
    }
    finish(&report)
}

fn finish(report: &RunReport) -> Result<()> {
    match &report.result {
        Some(result) if !result.success => Err(CliError::user("Push completed with failures")),
        Some(result) if result.cancelled => Err(CliError::user("Push cancelled")),
        _ => Ok(()),
    }
}
