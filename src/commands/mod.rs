//! Command implementations for isotask.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Each handler returns the process exit code for a
//! finished command; errors carry their own code.

mod clean;
mod rerun;
mod run;
mod split;
mod status;


use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::context::RunContext;
use crate::error::Result;
use crate::exit_codes;
use std::path::PathBuf;

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub base_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl Globals {
    pub fn context(&self) -> Result<RunContext> {
        RunContext::resolve(self.base_dir.as_deref())
    }

    /// Config from `--config`, `<base>/config.yaml`, or defaults.
    pub fn config(&self, ctx: &RunContext) -> Result<Config> {
        Config::resolve(ctx, self.config.as_deref())
    }
}

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let globals = Globals {
        base_dir: cli.base_dir,
        config: cli.config,
    };

    match cli.command {
        Command::Run(args) => run::cmd_run(&globals, args),
        Command::Split(args) => split::cmd_split(&globals, args).map(|()| exit_codes::SUCCESS),
        Command::Status(args) => status::cmd_status(&globals, args).map(|()| exit_codes::SUCCESS),
        Command::Rerun(args) => rerun::cmd_rerun(&globals, args),
        Command::Clean(args) => clean::cmd_clean(&globals, args).map(|()| exit_codes::SUCCESS),
    }
}
