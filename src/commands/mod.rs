//! Command implementations for pullguard.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Lock commands operate on the file lock backend rooted at
//! the configured data directory.

use crate::cli::{
    Cli, Command, ConfigAction, ConfigCheckArgs, ConfigCommand, LockAction, LockClearArgs,
    LockCommand, UnlockPullArgs,
};
use pullguard::config::Config;
use pullguard::error::{PullGuardError, Result};
use pullguard::locks::FileLockBackend;
use pullguard::project_lock::LockBackend;
use std::path::Path;
use tracing::{debug, info};

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Lock(lock_cmd) => {
            let config = load_config(&cli.config)?;
            dispatch_lock(lock_cmd, &config)
        }
        Command::Config(config_cmd) => dispatch_config(config_cmd, &cli.config),
    }
}

/// Dispatch lock subcommands.
fn dispatch_lock(lock_cmd: LockCommand, config: &Config) -> Result<()> {
    match lock_cmd.action {
        LockAction::List => cmd_lock_list(config),
        LockAction::Clear(args) => cmd_lock_clear(args, config),
        LockAction::UnlockPull(args) => cmd_lock_unlock_pull(args, config),
    }
}

fn dispatch_config(config_cmd: ConfigCommand, default_path: &Path) -> Result<()> {
    match config_cmd.action {
        ConfigAction::Check(args) => cmd_config_check(args, default_path),
    }
}

/// Load the config file, falling back to defaults when it does not exist.
///
/// A file that exists but fails to parse or validate is an error.
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path)
    } else {
        debug!(path = %path.display(), "config file not found; using defaults");
        Ok(Config::default())
    }
}

fn cmd_lock_list(config: &Config) -> Result<()> {
    let backend = FileLockBackend::from_config(config);
    let locks = backend.list_locks(config.lock_stale_minutes)?;

    if locks.is_empty() {
        println!("No active locks.");
        return Ok(());
    }

    println!("Active locks ({}):", locks.len());
    println!();

    for lock in &locks {
        println!("  {}:", lock.lock_key);
        println!("    Pull:       {}", lock.lock.pull);
        println!("    User:       {}", lock.lock.user.username);
        println!("    Owner:      {}", lock.metadata.owner);
        if let Some(pid) = lock.metadata.pid {
            println!("    PID:        {}", pid);
        }
        println!(
            "    Created:    {}",
            lock.metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("    Age:        {}", lock.metadata.age_string());
        if lock.is_stale {
            println!(
                "    Status:     STALE (exceeds {} min threshold)",
                config.lock_stale_minutes
            );
        }
        println!("    Path:       {}", lock.path.display());
        println!();
    }

    // Summary
    let stale_count = locks.iter().filter(|l| l.is_stale).count();
    if stale_count > 0 {
        println!(
            "Note: {} lock(s) are stale. Use `pullguard lock clear <lock-key> --force` to clear.",
            stale_count
        );
    }

    Ok(())
}

fn cmd_lock_clear(args: LockClearArgs, config: &Config) -> Result<()> {
    // Require --force flag
    if !args.force {
        return Err(PullGuardError::UserError(format!(
            "refusing to clear lock without --force flag.\n\n\
             Clearing a lock lets another pull request plan against the same project\n\
             while the holder's plan may still be waiting to be applied.\n\n\
             To clear the lock, run:\n  pullguard lock clear {} --force",
            args.lock_key
        )));
    }

    let backend = FileLockBackend::from_config(config);
    let cleared = backend.clear_lock(&args.lock_key, config.lock_stale_minutes)?;

    info!(
        lock_key = %cleared.lock_key,
        pull = %cleared.lock.pull,
        age_minutes = cleared.metadata.age().num_minutes(),
        was_stale = cleared.is_stale,
        "lock cleared"
    );

    println!("Cleared lock: {}", cleared);
    Ok(())
}

fn cmd_lock_unlock_pull(args: UnlockPullArgs, config: &Config) -> Result<()> {
    let backend = FileLockBackend::from_config(config);
    let released = backend.unlock_by_pull(&args.repo, args.pull)?;

    if released.is_empty() {
        println!("No locks held by {}#{}.", args.repo, args.pull);
        return Ok(());
    }

    println!("Released {} lock(s) held by {}#{}:", released.len(), args.repo, args.pull);
    for lock in &released {
        println!("  {}", lock.key());
    }
    Ok(())
}

fn cmd_config_check(args: ConfigCheckArgs, default_path: &Path) -> Result<()> {
    let path = args.path.as_deref().unwrap_or(default_path);
    let config = Config::load(path)?;

    println!("Config OK: {}", path.display());
    println!();
    print!("{}", config.to_yaml()?);
    Ok(())
}
