//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kit_core::{CancelFlag, ConflictStrategy, SyncOptions};

/// kitsync - keep an installed kit and its source package in step
#[derive(Parser, Debug)]
#[command(name = "kitsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Installed kit directory (defaults to the current directory)
    #[arg(long, global = true, env = "KITSYNC_DEST")]
    pub dest: Option<PathBuf>,

    /// Verbose logging and full error details
    #[arg(long, global = true)]
    pub debug: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by sync and push
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ApplyArgs {
    /// Show the plan without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Apply without asking for confirmation
    #[arg(short, long)]
    pub force: bool,

    /// Allow deletions
    #[arg(long)]
    pub confirm: bool,

    /// Allow changes to dangerous paths (settings, hooks)
    #[arg(long)]
    pub allow_critical: bool,

    /// How to resolve conflicts: skip, force_push or keep_source (push only)
    #[arg(long, default_value = "skip")]
    pub conflict_strategy: ConflictStrategy,

    /// Output as JSON for scripting
    #[arg(long)]
    pub json: bool,
}

impl ApplyArgs {
    pub fn options(&self, cancel: CancelFlag) -> SyncOptions {
        SyncOptions {
            dry_run: self.dry_run,
            conflict_strategy: self.conflict_strategy,
            confirm_delete: self.confirm,
            allow_critical: self.allow_critical,
            cancel,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Bring source package changes into the installed kit
    ///
    /// Local edits are never overwritten: files changed on both sides are
    /// reported as conflicts and left alone.
    ///
    /// Examples:
    ///   kitsync sync --dry-run        # Preview
    ///   kitsync sync --force --confirm # Apply, including deletions
    Sync {
        #[command(flatten)]
        apply: ApplyArgs,
    },

    /// Send local changes back to the source package
    ///
    /// Only paths on the pushable allow-list are considered.
    ///
    /// Examples:
    ///   kitsync push --dry-run
    ///   kitsync push --interactive
    ///   kitsync push --files commands/review.md --force
    ///   kitsync push --git --conflict-strategy force_push
    Push {
        #[command(flatten)]
        apply: ApplyArgs,

        /// Pick files from a list
        #[arg(short, long)]
        interactive: bool,

        /// Push only these paths
        #[arg(long, value_delimiter = ',')]
        files: Vec<String>,

        /// Push only paths matching these patterns
        #[arg(long)]
        include: Vec<String>,

        /// Never push paths matching these patterns
        #[arg(long)]
        exclude: Vec<String>,

        /// Push only files git reports as changed
        #[arg(long)]
        git: bool,
    },

    /// List stored backups, newest first
    Backups {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Restore the files saved in a backup
    Rollback {
        /// Backup id (see `kitsync backups`)
        id: String,

        /// Restore without asking for confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::parse_from([
            "kitsync",
            "--dest",
            "/kit",
            "sync",
            "--dry-run",
            "--confirm",
            "--allow-critical",
        ]);
        assert_eq!(cli.dest, Some(PathBuf::from("/kit")));
        let Commands::Sync { apply } = cli.command else {
            panic!("expected sync");
        };
        assert!(apply.dry_run);
        assert!(apply.confirm);
        assert!(apply.allow_critical);
        assert!(!apply.force);
        assert_eq!(apply.conflict_strategy, ConflictStrategy::Skip);
    }

    #[test]
    fn parses_push_selection() {
        let cli = Cli::parse_from([
            "kitsync",
            "push",
            "--files",
            "commands/a.md,commands/b.md",
            "--exclude",
            "*.draft.md",
            "--git",
            "--conflict-strategy",
            "force_push",
        ]);
        let Commands::Push {
            apply,
            files,
            exclude,
            git,
            interactive,
            ..
        } = cli.command
        else {
            panic!("expected push");
        };
        assert_eq!(files, vec!["commands/a.md", "commands/b.md"]);
        assert_eq!(exclude, vec!["*.draft.md"]);
        assert!(git);
        assert!(!interactive);
        assert_eq!(apply.conflict_strategy, ConflictStrategy::ForcePush);
    }

    #[test]
    fn rejects_unknown_strategy() {
        let result = Cli::try_parse_from(["kitsync", "push", "--conflict-strategy", "merge"]);
        assert!(result.is_err());
    }

    #[test]
    fn debug_is_global() {
        let cli = Cli::parse_from(["kitsync", "backups", "--debug"]);
        assert!(cli.debug);
    }
}
