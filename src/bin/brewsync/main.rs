//! brewsync CLI - converge Homebrew and npm globals on a declared list

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use miette::Diagnostic as _;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use brewsync::core::ManagerError;
use brewsync::ops::PreflightError;
use brewsync::util::context::DesiredFileError;
use brewsync::util::diagnostic::suggestions;
use brewsync::util::shell::Shell;
use cli::{Cli, Commands, MessageFormat};
use commands::ItemsFailed;

fn main() {
    let cli = Cli::parse();

    let shell = Arc::new(Shell::from_flags(
        cli.quiet,
        cli.verbose,
        cli.color,
        cli.message_format == MessageFormat::Json,
    ));

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("brewsync=debug")
    } else if cli.quiet {
        EnvFilter::new("brewsync=error")
    } else {
        EnvFilter::new("brewsync=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    if let Err(e) = run(cli, &shell) {
        // Per-item failures have already been summarized.
        if e.downcast_ref::<ItemsFailed>().is_none() {
            report_error(&e, &shell);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, shell: &Arc<Shell>) -> Result<()> {
    match cli.command {
        Commands::Install(args) => commands::install::execute(args, shell),
        Commands::Diff(args) => commands::diff::execute(args, shell),
        Commands::Clean(args) => commands::clean::execute(args, shell),
        Commands::Outdated => commands::outdated::execute(shell),
        Commands::Upgrade(args) => commands::upgrade::execute(args, shell),
        Commands::Maintain(args) => commands::maintain::execute(args, shell),
        Commands::Doctor(args) => commands::doctor::execute(args, shell),
        Commands::Explain(args) => commands::explain::execute(args, shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

fn report_error(e: &anyhow::Error, shell: &Shell) {
    if shell.is_json() {
        shell.error(format!("{:#}", e));
        return;
    }

    eprintln!("error: {:#}", e);
    if let Some(help) = help_for(e) {
        eprintln!("help: {}", help);
    }
}

/// A next step for errors that have an obvious one.
fn help_for(e: &anyhow::Error) -> Option<String> {
    e.chain().find_map(|cause| {
        if let Some(preflight) = cause.downcast_ref::<PreflightError>() {
            return preflight.help().map(|h| h.to_string());
        }
        if cause.downcast_ref::<DesiredFileError>().is_some() {
            return Some(suggestions::NO_DESIRED_FILE.to_string());
        }
        match cause.downcast_ref::<ManagerError>() {
            Some(ManagerError::Unavailable { manager: "brew" }) => {
                Some(suggestions::INSTALL_HOMEBREW.to_string())
            }
            _ => None,
        }
    })
}
