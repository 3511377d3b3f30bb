//! Persisting the store to `state.json` and restoring it.

use super::TaskStore;
use crate::context::RunContext;
use crate::error::{Result, RunnerError};
use crate::fs::atomic_write_file;
use crate::task::{ExitOutcome, ExitSummary, TaskState, TaskUnit};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Current `state.json` format version.
pub const STATE_VERSION: u32 = 1;

/// Error recorded for a task that was running when its run stopped.
const INTERRUPTED: &str = "interrupted: run ended while task was running";

/// On-disk form of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    /// Task list the run was parsed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub tasks: Vec<TaskUnit>,
}

impl StateFile {
    pub fn new(source: Option<PathBuf>, tasks: Vec<TaskUnit>) -> Self {
        Self {
            version: STATE_VERSION,
            source,
            tasks,
        }
    }
}

/// Write the run state atomically as pretty JSON.
pub fn save_state(ctx: &RunContext, state: &StateFile) -> Result<()> {
    let json = serde_json::to_string_pretty(state).map_err(|e| {
        RunnerError::UserError(format!("failed to serialize run state: {}", e))
    })?;
    atomic_write_file(ctx.state_path(), &format!("{}\n", json))
}

/// Read the run state written by a previous command.
pub fn load_state(ctx: &RunContext) -> Result<StateFile> {
    ctx.ensure_state_exists()?;
    let path = ctx.state_path();

    let content = std::fs::read_to_string(&path).map_err(|e| {
        RunnerError::UserError(format!(
            "failed to read run state '{}': {}",
            path.display(),
            e
        ))
    })?;

    let state: StateFile = serde_json::from_str(&content).map_err(|e| {
        RunnerError::UserError(format!(
            "failed to parse run state '{}': {}\n\n\
             Remove it with `isotask clean --all` and start a new run.",
            path.display(),
            e
        ))
    })?;

    if state.version != STATE_VERSION {
        return Err(RunnerError::UserError(format!(
            "unsupported run state version {} in '{}' (expected {})",
            state.version,
            path.display(),
            STATE_VERSION
        )));
    }

    Ok(state)
}

impl TaskStore {
    /// Rebuild a store from persisted state.
    ///
    /// A task found `Running` belongs to a run that stopped mid-task; it is
    /// recorded as `Failed`. This counts as the store's initialization.
    pub fn restore(state: StateFile) -> Result<Self> {
        let mut tasks = state.tasks;

        for task in tasks.iter_mut().filter(|t| t.state == TaskState::Running) {
            warn!(task = %task.id, "task was running when the previous run stopped");
            task.state = TaskState::Failed;
            task.ended_at = Some(Utc::now());
            task.exit_summary = Some(ExitSummary {
                clean_termination: false,
                ..ExitSummary::failed_before_start(ExitOutcome::SupervisorError, INTERRUPTED)
            });
        }

        let mut store = TaskStore::new();
        store.initialize(tasks)?;
        Ok(store)
    }

    /// Capture the store in its on-disk form.
    pub fn to_state_file(&self, source: Option<PathBuf>) -> StateFile {
        StateFile::new(source, self.tasks.clone())
    }
}
