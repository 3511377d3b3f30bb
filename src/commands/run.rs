//! Implementation of the `isotask run` command.
//!
//! Holds the run lock for the whole run. With a task list the run starts
//! fresh; without one it resumes from `state.json`.

use super::Globals;
use crate::cli::RunArgs;
use crate::config::{Config, OutputMode};
use crate::error::{Result, RunnerError};
use crate::exit_codes;
use crate::locks::acquire_run_lock;
use crate::orchestrator::{HaltReason, Orchestrator, RunReport, StatusObserver};
use crate::report::{
    DashboardObserver, PlainObserver, halt_line, print_json, render_table, summary_line,
};
use crate::signals::SignalWatcher;
use std::time::Duration;

/// How often the signal watcher checks for SIGINT/SIGTERM.
pub(super) const SIGNAL_POLL: Duration = Duration::from_millis(50);

pub fn cmd_run(globals: &Globals, args: RunArgs) -> Result<i32> {
    let ctx = globals.context()?;
    let config = globals.config(&ctx)?.with_overrides(&args.overrides())?;

    ctx.ensure_layout()?;
    let _lock = acquire_run_lock(&ctx, "run")?;

    let orchestrator = match &args.task_list {
        Some(list) => Orchestrator::from_task_list(ctx.clone(), config.clone(), list)?,
        None => Orchestrator::resume(ctx.clone(), config.clone())?,
    };

    let mut orchestrator = attach(orchestrator, &config);
    let _watcher = SignalWatcher::spawn(orchestrator.cancel_token().clone(), SIGNAL_POLL);

    let report = orchestrator.run_all()?;
    finish(&report, config.output_mode)
}

/// Attach the progress observer for the configured output mode.
pub(super) fn attach(orchestrator: Orchestrator, config: &Config) -> Orchestrator {
    let observer: Option<Box<dyn StatusObserver>> = match config.output_mode {
        OutputMode::Plain => Some(Box::new(PlainObserver)),
        OutputMode::Dashboard => Some(Box::new(DashboardObserver::new(
            orchestrator.store().tasks(),
            config.preview_chars,
        ))),
        OutputMode::Json => None,
    };

    match observer {
        Some(observer) => orchestrator.with_observer(observer),
        None => orchestrator,
    }
}

fn finish(report: &RunReport, mode: OutputMode) -> Result<i32> {
    match mode {
        OutputMode::Json => print_json(report)?,
        OutputMode::Plain => {
            println!();
            println!("{}", summary_line(report.summary()));
        }
        OutputMode::Dashboard => {
            // The last transition already printed the table; an early halt
            // may not have produced one.
            if report.executed == 0 {
                print!("{}", render_table(&report.status));
            }
        }
    }

    if let Some(reason) = &report.halted {
        eprintln!("{}", halt_line(reason));
        if *reason == HaltReason::Cancelled {
            return Err(RunnerError::CancellationRequested);
        }
    }

    Ok(run_exit_code(report))
}

/// Success only when every task completed.
pub(super) fn run_exit_code(report: &RunReport) -> i32 {
    if report.summary().success {
        exit_codes::SUCCESS
    } else {
        exit_codes::PARTIAL_FAILURE
    }
}
