//! CLI argument parsing for pullguard.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pullguard: inspect and repair project locks held for pull requests.
///
/// Project locks are stored as files under `<data_dir>/locks`. These
/// commands list them, clear abandoned ones, and release every lock of a
/// closed pull request.
#[derive(Parser, Debug)]
#[command(name = "pullguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = pullguard::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for pullguard.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Project lock management commands.
    Lock(LockCommand),

    /// Configuration commands.
    Config(ConfigCommand),
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// List all project locks.
    ///
    /// Shows the holding pull request, user, owner and age of each lock.
    List,

    /// Clear a specific lock.
    ///
    /// Requires --force flag to prevent accidental clearing.
    Clear(LockClearArgs),

    /// Release every lock held by a pull request.
    UnlockPull(UnlockPullArgs),
}

/// Arguments for the `lock clear` command.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Lock key to clear (e.g., owner/repo/terraform/default).
    pub lock_key: String,

    /// Force clearing the lock (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `lock unlock-pull` command.
#[derive(Parser, Debug)]
pub struct UnlockPullArgs {
    /// Repository full name (e.g., owner/repo).
    pub repo: String,

    /// Pull request number.
    pub pull: u64,
}

/// Config subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Load and validate a configuration file, then print the effective values.
    Check(ConfigCheckArgs),
}

#[derive(Parser, Debug)]
pub struct ConfigCheckArgs {
    /// File to check; defaults to the global --config path.
    pub path: Option<PathBuf>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
