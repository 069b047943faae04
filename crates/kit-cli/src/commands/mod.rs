//! Command implementations

pub mod backups;
pub mod push;
pub mod sync;

use std::io::IsTerminal;

use dialoguer::Confirm;

use crate::error::Result;

pub use backups::{run_backups, run_rollback};
pub use push::run_push;
pub use sync::run_sync;

/// Ask before applying, unless forced or not attached to a terminal.
fn confirm(prompt: &str, force: bool) -> Result<bool> {
    if force || !std::io::stdout().is_terminal() {
        return Ok(true);
    }
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
