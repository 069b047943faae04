//! Backup listing and rollback

use std::path::Path;

use colored::Colorize;
use kit_core::SyncEngine;
use serde_json::json;

use super::confirm;
use crate::error::Result;

/// List stored backups, newest first
pub fn run_backups(dest: &Path, json: bool) -> Result<()> {
    let engine = SyncEngine::open(dest)?;
    let backups = engine.backups()?;

    if json {
        let output: Vec<_> = backups
            .iter()
            .map(|b| {
                json!({
                    "id": b.manifest.id,
                    "direction": b.manifest.direction,
                    "created": b.manifest.created,
                    "root": b.manifest.root,
                    "files": b.manifest.files.len() + b.manifest.absent.len(),
                    "path": b.path,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if backups.is_empty() {
        println!("No backups");
        return Ok(());
    }
    for backup in &backups {
        let manifest = &backup.manifest;
        println!(
            "{}  {}  {} file(s)",
            manifest.id.cyan(),
            manifest.created.format("%Y-%m-%d %H:%M:%S UTC"),
            manifest.files.len() + manifest.absent.len()
        );
    }
    Ok(())
}

/// Restore a backup into the tree it was taken of
pub fn run_rollback(dest: &Path, id: &str, force: bool) -> Result<()> {
    let engine = SyncEngine::open(dest)?;

    if !confirm(&format!("Restore backup {}?", id), force)? {
        println!("Aborted");
        return Ok(());
    }

    let report = engine.rollback(id)?;
    for path in &report.restored {
        println!("  {} restored {}", "OK".green().bold(), path);
    }
    for path in &report.removed {
        println!("  {} removed {}", "OK".green().bold(), path);
    }
    println!(
        "{} Rolled back {} ({} restored, {} removed)",
        "=>".blue().bold(),
        id.cyan(),
        report.restored.len(),
        report.removed.len()
    );
    Ok(())
}
