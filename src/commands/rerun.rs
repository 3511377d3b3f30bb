//! Implementation of the `isotask rerun` command.

use super::Globals;
use super::run::{SIGNAL_POLL, attach};
use crate::cli::RerunArgs;
use crate::config::OutputMode;
use crate::error::{Result, RunnerError};
use crate::exit_codes;
use crate::locks::acquire_run_lock;
use crate::orchestrator::Orchestrator;
use crate::report::print_json;
use crate::signals::SignalWatcher;
use crate::task::{ExitOutcome, TaskState};

/// Run one task of the persisted run again.
///
/// The task is reset if it already finished. Other tasks keep their state.
pub fn cmd_rerun(globals: &Globals, args: RerunArgs) -> Result<i32> {
    let ctx = globals.context()?;
    let mut overrides = args.agent.overrides();
    if args.json {
        overrides.output_mode = Some(OutputMode::Json);
    }
    let config = globals.config(&ctx)?.with_overrides(&overrides)?;

    ctx.ensure_state_exists()?;
    let _lock = acquire_run_lock(&ctx, "rerun")?;

    let mut orchestrator = attach(Orchestrator::resume(ctx.clone(), config.clone())?, &config);
    let _watcher = SignalWatcher::spawn(orchestrator.cancel_token().clone(), SIGNAL_POLL);

    let task = orchestrator.run_one(&args.task_id)?;

    if config.output_mode == OutputMode::Json {
        let status = orchestrator.status();
        print_json(&status.get(&task.id))?;
    }

    let cancelled = task
        .exit_summary
        .as_ref()
        .is_some_and(|s| s.outcome == ExitOutcome::Cancelled);
    if cancelled {
        return Err(RunnerError::CancellationRequested);
    }

    Ok(match task.state {
        TaskState::Completed => exit_codes::SUCCESS,
        _ => exit_codes::PARTIAL_FAILURE,
    })
}
