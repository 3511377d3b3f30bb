//! Task orchestrator.
//!
//! Drives the store through the supervisor in document order:
//!
//! ```text
//! next_pending() -> Running -> Supervisor::execute() -> terminal state
//! ```
//!
//! A task that fails or times out does not stop the run. The loop ends when
//! nothing is pending, when the run is cancelled, or when too many agents in
//! a row could not even be spawned. Store protocol violations are fatal.
//!
//! Every transition is persisted to `state.json`, appended to
//! `events.ndjson`, and pushed to the optional [`StatusObserver`].


use crate::config::Config;
use crate::context::RunContext;
use crate::error::{Result, RunnerError};
use crate::events::{Event, EventAction, append_event};
use crate::parser::parse_task_list;
use crate::store::{
    StatusSnapshot, SummaryStats, TaskStore, TransitionDetails, load_state, save_state,
};
use crate::supervisor::{CancelToken, Execution, Supervisor, SupervisorSettings};
use crate::task::{ExitOutcome, TaskState, TaskUnit};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Receives every committed transition, for live reporting.
pub trait StatusObserver {
    fn on_transition(&mut self, task: &TaskUnit, stats: &SummaryStats);
}

/// Why a run stopped before every task was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum HaltReason {
    /// Too many agents in a row failed to launch.
    SpawnFailures { count: u32 },
    /// The cancel token was set.
    Cancelled,
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::SpawnFailures { count } => {
                write!(f, "{} consecutive agent spawn failures", count)
            }
            HaltReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of `run_all`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Tasks executed by this call.
    pub executed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<HaltReason>,
    #[serde(flatten)]
    pub status: StatusSnapshot,
}

impl RunReport {
    pub fn summary(&self) -> &SummaryStats {
        &self.status.summary
    }
}

/// Sequential runner for one base directory.
pub struct Orchestrator {
    ctx: RunContext,
    config: Config,
    store: TaskStore,
    supervisor: Supervisor,
    cancel: CancelToken,
    observer: Option<Box<dyn StatusObserver>>,
    source: Option<PathBuf>,
}

impl Orchestrator {
    /// Wrap an initialized store.
    pub fn new(ctx: RunContext, config: Config, store: TaskStore) -> Self {
        let supervisor = Supervisor::new(ctx.clone(), SupervisorSettings::from_config(&config));
        Self {
            ctx,
            config,
            store,
            supervisor,
            cancel: CancelToken::new(),
            observer: None,
            source: None,
        }
    }

    /// Parse `task_list`, materialize its sections, and start a fresh run.
    ///
    /// Parse errors and empty task lists surface here, before any agent is
    /// spawned. The initial state is persisted immediately.
    pub fn from_task_list(ctx: RunContext, config: Config, task_list: &Path) -> Result<Self> {
        let units = parse_task_list(task_list, &ctx)?;
        let mut store = TaskStore::new();
        store.initialize(units)?;
        info!(
            source = %task_list.display(),
            tasks = store.tasks().len(),
            "task list parsed"
        );

        let mut orchestrator = Self::new(ctx, config, store);
        orchestrator.source = Some(task_list.to_path_buf());
        orchestrator.persist()?;
        Ok(orchestrator)
    }

    /// Continue the run persisted in the base directory.
    ///
    /// A task left `Running` by an interrupted run is recorded as failed.
    pub fn resume(ctx: RunContext, config: Config) -> Result<Self> {
        let state = load_state(&ctx)?;
        let source = state.source.clone();
        let store = TaskStore::restore(state)?;

        let mut orchestrator = Self::new(ctx, config, store);
        orchestrator.source = source;
        orchestrator.persist()?;
        Ok(orchestrator)
    }

    /// Replace the supervisor settings derived from config.
    pub fn with_settings(mut self, settings: SupervisorSettings) -> Self {
        self.supervisor = Supervisor::new(self.ctx.clone(), settings);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn StatusObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn status(&self) -> StatusSnapshot {
        self.store.snapshot(self.config.preview_chars)
    }

    pub fn summary_stats(&self) -> SummaryStats {
        self.store.summary()
    }

    /// Run every pending task in document order.
    pub fn run_all(&mut self) -> Result<RunReport> {
        let stats = self.store.summary();
        info!(total = stats.total, pending = stats.pending, "run started");
        append_event(
            &self.ctx,
            &Event::new(EventAction::RunStarted).with_details(json!({
                "source": self.source.as_ref().map(|p| p.display().to_string()),
                "total": stats.total,
                "pending": stats.pending,
            })),
        )?;

        let max_failures = self.config.max_consecutive_spawn_failures;
        let mut spawn_failures = 0u32;
        let mut executed = 0usize;

        let halted = loop {
            if self.cancel.is_cancelled() {
                break Some(HaltReason::Cancelled);
            }
            let Some(next) = self.store.next_pending() else {
                break None;
            };
            let id = next.id.clone();

            if executed > 0 && !self.pause() {
                break Some(HaltReason::Cancelled);
            }

            let execution = self.execute(&id)?;
            executed += 1;

            if execution.summary.outcome == ExitOutcome::Cancelled {
                break Some(HaltReason::Cancelled);
            }
            if execution.is_spawn_failure() {
                spawn_failures += 1;
                if max_failures > 0 && spawn_failures >= max_failures {
                    warn!(count = spawn_failures, "halting run: agent keeps failing to spawn");
                    break Some(HaltReason::SpawnFailures {
                        count: spawn_failures,
                    });
                }
            } else {
                spawn_failures = 0;
            }
        };

        let report = RunReport {
            executed,
            halted,
            status: self.status(),
        };
        let stats = report.summary();
        info!(
            executed,
            completed = stats.completed,
            failed = stats.failed,
            timed_out = stats.timed_out,
            halted = ?halted,
            "run finished"
        );
        append_event(
            &self.ctx,
            &Event::new(EventAction::RunFinished).with_details(json!({
                "executed": executed,
                "halted": halted,
                "summary": stats,
            })),
        )?;

        Ok(report)
    }

    /// Run exactly one task, resetting it first if it already finished.
    ///
    /// Other tasks are not touched. Fails with `InvalidTransition` if the
    /// task is currently running.
    pub fn run_one(&mut self, id: &str) -> Result<TaskUnit> {
        let previous = self
            .store
            .get(id)
            .map(|task| task.state)
            .ok_or_else(|| RunnerError::UnknownTask(id.to_string()))?;

        if previous == TaskState::Running {
            return Err(RunnerError::InvalidTransition {
                id: id.to_string(),
                from: TaskState::Running,
                to: TaskState::Running,
            });
        }
        if previous.is_terminal() {
            let task = self.store.reset_for_rerun(id)?.clone();
            info!(task = %task.id, %previous, "task reset for re-run");
            self.committed(
                &task,
                Event::new(EventAction::TaskReset)
                    .with_task(&task.id)
                    .with_details(json!({ "previous": previous, "attempt": task.attempt })),
            )?;
        }

        self.execute(id)?;
        self.store
            .get(id)
            .cloned()
            .ok_or_else(|| RunnerError::UnknownTask(id.to_string()))
    }

    /// Run one pending task to its terminal state and commit it.
    fn execute(&mut self, id: &str) -> Result<Execution> {
        let task = self
            .store
            .transition(id, TaskState::Running, TransitionDetails::started(Utc::now()))?
            .clone();
        self.committed(
            &task,
            Event::new(EventAction::TaskStarted)
                .with_task(&task.id)
                .with_details(json!({ "attempt": task.attempt, "title": task.title })),
        )?;

        let execution = self.supervisor.execute(&task, &self.cancel);

        let task = self
            .store
            .transition(
                id,
                execution.state,
                TransitionDetails::finished(execution.ended_at, execution.summary.clone()),
            )?
            .clone();
        self.committed(
            &task,
            Event::new(EventAction::TaskFinished)
                .with_task(&task.id)
                .with_details(json!({
                    "state": execution.state,
                    "outcome": execution.summary.outcome,
                    "exit_code": execution.summary.exit_code,
                    "duration_ms": execution.summary.duration_ms,
                    "clean_termination": execution.summary.clean_termination,
                })),
        )?;

        Ok(execution)
    }

    /// Persist, log and publish a transition the store just accepted.
    fn committed(&mut self, task: &TaskUnit, event: Event) -> Result<()> {
        self.persist()?;
        append_event(&self.ctx, &event)?;
        debug!(task = %task.id, state = %task.state, "transition committed");

        let stats = self.store.summary();
        if let Some(observer) = self.observer.as_mut() {
            observer.on_transition(task, &stats);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        save_state(&self.ctx, &self.store.to_state_file(self.source.clone()))
    }

    /// Wait out the inter-task delay. Returns `false` if cancelled meanwhile.
    fn pause(&self) -> bool {
        let delay = self.config.inter_task_delay();
        if delay.is_zero() {
            return true;
        }

        let deadline = Instant::now() + delay;
        let step = self.supervisor.settings().poll_interval.max(Duration::from_millis(1));
        while Instant::now() < deadline {
            if self.cancel.is_cancelled() {
                return false;
            }
            thread::sleep(step.min(deadline.saturating_duration_since(Instant::now())));
        }
        !self.cancel.is_cancelled()
    }
}
