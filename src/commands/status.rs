//! Implementation of the `isotask status` command.
//!
//! Reads `state.json` without taking the run lock, so it can be used while a
//! run is in progress.

use super::Globals;
use crate::cli::StatusArgs;
use crate::config::Config;
use crate::error::Result;
use crate::locks::read_run_lock;
use crate::report::{print_json, render_table};
use crate::store::{StatusSnapshot, load_state};

pub fn cmd_status(globals: &Globals, args: StatusArgs) -> Result<()> {
    let ctx = globals.context()?;
    let config = globals.config(&ctx).unwrap_or_else(|_| Config::default());

    let state = load_state(&ctx)?;
    let snapshot = StatusSnapshot::from_tasks(&state.tasks, config.preview_chars);

    if args.json {
        return print_json(&snapshot);
    }

    println!("Run Status");
    println!("==========");
    if let Some(source) = &state.source {
        println!("Task list: {}", source.display());
    }
    println!("Base dir:  {}", ctx.base_dir.display());

    if let Some(lock) = read_run_lock(&ctx) {
        let pid = lock
            .pid
            .map(|p| format!("pid {}", p))
            .unwrap_or_else(|| "unknown pid".to_string());
        let stale = if lock.is_stale() { " [STALE]" } else { "" };
        println!(
            "Lock:      {} by {} ({}, {} ago){}",
            lock.action,
            lock.owner,
            pid,
            lock.age_string(),
            stale
        );
    }
    println!();

    print!("{}", render_table(&snapshot));
    Ok(())
}
