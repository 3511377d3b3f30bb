//! In-memory task store for one run.
//!
//! The store is the single source of truth for task lifecycle state. It is
//! owned by the orchestrator and mutated only from its control loop, so it
//! carries no internal locking. Every state change goes through
//! [`TaskStore::transition`], which enforces the lifecycle table and the
//! one-running-task rule.

mod persist;
mod snapshot;


use crate::error::{Result, RunnerError};
use crate::task::{ExitSummary, TaskState, TaskUnit};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub use persist::{STATE_VERSION, StateFile, load_state, save_state};
pub use snapshot::{StatusSnapshot, SummaryStats, TaskStatus};

/// Supervisor-provided data accompanying a state change.
#[derive(Debug, Clone)]
pub struct TransitionDetails {
    /// When the change happened, as observed by the supervisor.
    pub at: DateTime<Utc>,
    /// Required when entering a terminal state.
    pub exit_summary: Option<ExitSummary>,
}

impl TransitionDetails {
    /// Details for entering `Running`.
    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            at,
            exit_summary: None,
        }
    }

    /// Details for entering a terminal state.
    pub fn finished(at: DateTime<Utc>, summary: ExitSummary) -> Self {
        Self {
            at,
            exit_summary: Some(summary),
        }
    }
}

/// Ordered registry of the run's task units.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<TaskUnit>,
    index: HashMap<String, usize>,
    initialized: bool,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the run's task units. Allowed exactly once per store.
    pub fn initialize(&mut self, units: Vec<TaskUnit>) -> Result<()> {
        if self.initialized {
            return Err(RunnerError::AlreadyInitialized);
        }
        if units.is_empty() {
            return Err(RunnerError::EmptyTaskList);
        }

        let mut index = HashMap::with_capacity(units.len());
        for (pos, unit) in units.iter().enumerate() {
            if index.insert(unit.id.clone(), pos).is_some() {
                return Err(RunnerError::UserError(format!(
                    "duplicate task id '{}' in run",
                    unit.id
                )));
            }
        }

        self.tasks = units;
        self.index = index;
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// All tasks in parse order.
    pub fn tasks(&self) -> &[TaskUnit] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&TaskUnit> {
        self.index.get(id).map(|&pos| &self.tasks[pos])
    }

    /// The task currently running, if any.
    pub fn running(&self) -> Option<&TaskUnit> {
        self.tasks.iter().find(|t| t.state == TaskState::Running)
    }

    /// The earliest pending task in parse order.
    ///
    /// Returns `None` while a task is running: the next task may only start
    /// after the current one has been committed.
    pub fn next_pending(&self) -> Option<&TaskUnit> {
        if self.running().is_some() {
            return None;
        }
        self.tasks.iter().find(|t| t.state == TaskState::Pending)
    }

    /// Apply a lifecycle step to one task.
    ///
    /// Entering `Running` stamps `started_at` and counts an attempt. Entering
    /// a terminal state stamps `ended_at` and records the exit summary.
    pub fn transition(
        &mut self,
        id: &str,
        new_state: TaskState,
        details: TransitionDetails,
    ) -> Result<&TaskUnit> {
        let pos = self.position(id)?;
        let from = self.tasks[pos].state;

        let invalid = || RunnerError::InvalidTransition {
            id: id.to_string(),
            from,
            to: new_state,
        };

        if !from.can_transition_to(new_state) {
            return Err(invalid());
        }
        if new_state == TaskState::Running && self.running().is_some() {
            return Err(invalid());
        }
        if new_state.is_terminal() && details.exit_summary.is_none() {
            return Err(invalid());
        }

        let task = &mut self.tasks[pos];
        match new_state {
            TaskState::Running => {
                task.started_at = Some(details.at);
                task.ended_at = None;
                task.exit_summary = None;
                task.attempt += 1;
            }
            _ => {
                task.ended_at = Some(details.at);
                task.exit_summary = details.exit_summary;
            }
        }
        task.state = new_state;

        Ok(&self.tasks[pos])
    }

    /// Return a terminal task to `Pending` for an explicit re-run.
    ///
    /// Identity and the attempt count are kept; timestamps and the previous
    /// exit summary are cleared.
    pub fn reset_for_rerun(&mut self, id: &str) -> Result<&TaskUnit> {
        let pos = self.position(id)?;
        let task = &mut self.tasks[pos];

        if !task.state.is_terminal() {
            return Err(RunnerError::InvalidTransition {
                id: id.to_string(),
                from: task.state,
                to: TaskState::Pending,
            });
        }

        task.state = TaskState::Pending;
        task.started_at = None;
        task.ended_at = None;
        task.exit_summary = None;

        Ok(&self.tasks[pos])
    }

    /// Aggregate counts over all tasks.
    pub fn summary(&self) -> SummaryStats {
        SummaryStats::from_tasks(&self.tasks)
    }

    /// Read-only per-task projection for status surfaces.
    pub fn snapshot(&self, preview_chars: usize) -> StatusSnapshot {
        StatusSnapshot::from_tasks(&self.tasks, preview_chars)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| RunnerError::UnknownTask(id.to_string()))
    }
}
