//! CLI argument parsing for isotask.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use crate::config::{OutputMode, Overrides};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Isotask: run a markdown task list one isolated agent invocation at a time.
///
/// Each task section of the list is written to its own artifact and handed to
/// an external agent CLI in a fresh working directory, with a timeout and
/// full process-tree cleanup.
#[derive(Parser, Debug)]
#[command(name = "isotask")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Base directory for artifacts, results and run state.
    #[arg(long, global = true, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Config file to use instead of `<base>/config.yaml`.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More diagnostic output on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for isotask.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every pending task of a task list.
    ///
    /// With a task list, starts a fresh run. Without one, or with
    /// `--resume`, continues the run persisted in the base directory.
    Run(RunArgs),

    /// Split a task list into isolated task artifacts without running them.
    Split(SplitArgs),

    /// Show the status of the persisted run.
    Status(StatusArgs),

    /// Run one task again, whatever its current outcome.
    Rerun(RerunArgs),

    /// Remove working directories and, with `--all`, every run artifact.
    Clean(CleanArgs),
}

/// Agent settings that override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct AgentArgs {
    /// Per-task timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Agent command template, e.g. `"claude --print"`.
    #[arg(long, value_name = "CMD")]
    pub agent: Option<String>,

    /// Do not feed the task artifact to the agent on stdin.
    #[arg(long)]
    pub no_stdin: bool,
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Markdown task list to split and run.
    pub task_list: Option<PathBuf>,

    /// Continue the persisted run, skipping finished tasks.
    #[arg(long, conflicts_with = "task_list")]
    pub resume: bool,

    #[command(flatten)]
    pub agent: AgentArgs,

    /// Print the final report as JSON (same as `--output json`).
    #[arg(long, conflicts_with = "output")]
    pub json: bool,

    /// How progress is reported.
    #[arg(long, value_enum)]
    pub output: Option<OutputMode>,
}

impl RunArgs {
    pub fn overrides(&self) -> Overrides {
        let output_mode = if self.json {
            Some(OutputMode::Json)
        } else {
            self.output
        };
        Overrides {
            output_mode,
            ..self.agent.overrides()
        }
    }
}

impl AgentArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            timeout_seconds: self.timeout,
            agent_command: self.agent.clone(),
            no_stdin: self.no_stdin,
            output_mode: None,
        }
    }
}

/// Arguments for the `split` command.
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Markdown task list to split.
    pub task_list: PathBuf,

    /// Print the task units as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `status` command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the snapshot as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `rerun` command.
#[derive(Args, Debug)]
pub struct RerunArgs {
    /// Task id, e.g. `002_write_docs`.
    pub task_id: String,

    #[command(flatten)]
    pub agent: AgentArgs,

    /// Print the task's status as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `clean` command.
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Also remove task artifacts, results, run state and the event log.
    #[arg(long)]
    pub all: bool,

    /// Print what would be removed without removing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
