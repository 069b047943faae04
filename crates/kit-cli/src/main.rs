//! kitsync command-line interface

mod cli;
mod commands;
mod error;
mod interactive;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use kit_core::CancelFlag;
use tracing::{Level, warn};
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use commands::push::PushSelection;
use error::Result;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = cli.debug;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if debug { Level::DEBUG } else { Level::WARN })
        .with_target(debug)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("{}: could not set up logging: {}", "warning".yellow().bold(), e);
    }
    tracing::debug!("Debug logging enabled");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            if debug {
                eprintln!("{:?}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let dest = match cli.dest {
        Some(dest) => dest,
        None => std::env::current_dir()?,
    };

    let cancel = CancelFlag::new();
    install_interrupt_handler(&cancel);

    execute(cli.command, dest, cancel)
}

/// First Ctrl-C stops after the current file; the run still records what it did.
fn install_interrupt_handler(cancel: &CancelFlag) {
    let flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.cancel()) {
        warn!(error = %e, "Could not install interrupt handler");
    }
}

fn execute(command: Commands, dest: PathBuf, cancel: CancelFlag) -> Result<()> {
    match command {
        Commands::Sync { apply } => commands::run_sync(&dest, &apply, cancel),
        Commands::Push {
            apply,
            interactive,
            files,
            include,
            exclude,
            git,
        } => {
            let selection = PushSelection {
                interactive,
                files,
                include,
                exclude,
                git,
            };
            commands::run_push(&dest, &apply, &selection, cancel)
        }
        Commands::Backups { json } => commands::run_backups(&dest, json),
        Commands::Rollback { id, force } => commands::run_rollback(&dest, &id, force),
    }
}
