//! Sync command implementation

use std::path::Path;

use colored::Colorize;
use kit_core::{CancelFlag, RunReport, SyncEngine, SyncOptions};

use super::confirm;
use crate::cli::ApplyArgs;
use crate::error::{CliError, Result};
use crate::output::{print_json, print_plan, print_result};

/// Run the sync command
pub fn run_sync(dest: &Path, args: &ApplyArgs, cancel: CancelFlag) -> Result<()> {
    let engine = SyncEngine::open(dest)?;
    let options = args.options(cancel);

    if args.json {
        let report = engine.sync(&options)?;
        print_json(&report)?;
        return finish(&report);
    }

    println!(
        "{} Syncing {} from {}",
        "=>".blue().bold(),
        engine.dest().display().to_string().cyan(),
        engine.source().display().to_string().cyan()
    );

    let preview = engine.sync(&SyncOptions {
        dry_run: true,
        ..options.clone()
    })?;
    print_plan(&preview.plan);

    if options.dry_run || preview.plan.is_empty() {
        if options.dry_run {
            println!("{} Dry run, nothing changed", "=>".blue().bold());
        }
        return Ok(());
    }
    if !confirm("Apply these changes?", args.force)? {
        println!("Aborted");
        return Ok(());
    }

    // Re-planned from disk; refuses to run if it no longer matches the preview
    let report = engine.sync_approved(&options, &preview.plan)?;
    if let Some(result) = &report.result {
        print_result(result);
    }
    finish(&report)
}

fn finish(report: &RunReport) -> Result<()> {
    match &report.result {
        Some(result) if !result.success => Err(CliError::user("Sync completed with failures")),
        Some(result) if result.cancelled => Err(CliError::user("Sync cancelled")),
        _ => Ok(()),
    }
}
