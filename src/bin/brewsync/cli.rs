//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use brewsync::util::shell::ColorChoice;

/// brewsync - keep Homebrew and npm globals in line with a Brewsync.toml
#[derive(Parser)]
#[command(name = "brewsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Output format for messages
    #[arg(
        long,
        global = true,
        value_enum,
        value_name = "FMT",
        default_value_t = MessageFormat::Human
    )]
    pub message_format: MessageFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install everything listed in Brewsync.toml that is missing
    Install(InstallArgs),

    /// Show installed packages that Brewsync.toml does not list
    Diff(DiffArgs),

    /// Remove installed packages that Brewsync.toml does not list
    Clean(CleanArgs),

    /// List Homebrew packages with newer versions available
    Outdated,

    /// Run `brew update` then `brew upgrade`
    Upgrade(UpgradeArgs),

    /// Run `brew cleanup`
    Maintain(MaintainArgs),

    /// Check the environment for problems
    Doctor(DoctorArgs),

    /// Classify package-manager error output
    Explain(ExplainArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct InstallArgs {
    /// Path to the desired-state file (defaults to the nearest Brewsync.toml)
    #[arg(short, long, value_name = "PATH", env = "BREWSYNC_FILE")]
    pub file: Option<PathBuf>,

    /// Show what would be installed without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Number of concurrent formula and cask installs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Skip the network and disk-space checks
    #[arg(long)]
    pub skip_preflight: bool,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Path to the desired-state file (defaults to the nearest Brewsync.toml)
    #[arg(short, long, value_name = "PATH", env = "BREWSYNC_FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Path to the desired-state file (defaults to the nearest Brewsync.toml)
    #[arg(short, long, value_name = "PATH", env = "BREWSYNC_FILE")]
    pub file: Option<PathBuf>,

    /// Show what would be removed without removing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct UpgradeArgs {
    /// Show the commands without running them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct MaintainArgs {
    /// Show the commands without running them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct DoctorArgs {
    /// Skip network checks
    #[arg(long)]
    pub offline: bool,
}

#[derive(Args)]
pub struct ExplainArgs {
    /// Error output to classify (read from stdin when omitted)
    pub output: Vec<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
