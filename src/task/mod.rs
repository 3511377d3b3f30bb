//! Task unit model.
//!
//! A `TaskUnit` is one heading-delimited section of the task list, materialized
//! as its own read-only artifact. Identity (`id`, `ordinal`, `title`, `body`,
//! `source_path`) is fixed at parse time; only lifecycle fields change, and
//! only through the task store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod state;
#[cfg(test)]
mod tests;

pub use state::{ALL_STATES, TaskState};

/// One isolated unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUnit {
    /// Stable identifier: `{ordinal:03}_{slug}`.
    pub id: String,

    /// 1-based position of the section in the task list.
    pub ordinal: usize,

    /// Heading text with any `Task N:` prefix removed.
    pub title: String,

    /// Exact instructions handed to the agent.
    pub body: String,

    /// Location of the isolated artifact for this task.
    pub source_path: PathBuf,

    /// Current lifecycle state.
    pub state: TaskState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Present only in terminal states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_summary: Option<ExitSummary>,

    /// Number of times this task has been started.
    #[serde(default)]
    pub attempt: u32,
}

impl TaskUnit {
    /// Create a fresh pending unit.
    pub fn new(
        id: impl Into<String>,
        ordinal: usize,
        title: impl Into<String>,
        body: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            ordinal,
            title: title.into(),
            body: body.into(),
            source_path: source_path.into(),
            state: TaskState::Pending,
            started_at: None,
            ended_at: None,
            exit_summary: None,
            attempt: 0,
        }
    }

    /// Wall-clock duration of the last attempt, if it finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// How a supervised execution ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitOutcome {
    /// The process exited on its own (any exit code).
    #[default]
    Exited,
    /// The deadline expired and the process tree was killed.
    TimedOut,
    /// An external stop signal ended the execution.
    Cancelled,
    /// The agent could not be launched.
    SpawnFailed,
    /// The supervisor itself failed, or the run was interrupted mid-task.
    SupervisorError,
}

/// Captured result of one execution, recorded with the terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSummary {
    /// Process exit code; `None` when killed by a signal or never started.
    pub exit_code: Option<i32>,

    /// Captured stdout.
    #[serde(default)]
    pub stdout: String,

    /// Captured stderr.
    #[serde(default)]
    pub stderr: String,

    pub duration_ms: u64,

    pub outcome: ExitOutcome,

    /// Whether the whole process tree was confirmed gone.
    #[serde(default = "default_true")]
    pub clean_termination: bool,

    /// Supervisor-side error or marker (spawn failure, cancellation, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for ExitSummary {
    fn default() -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            outcome: ExitOutcome::default(),
            clean_termination: true,
            error: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl ExitSummary {
    /// Summary for an execution that never produced a process.
    pub fn failed_before_start(outcome: ExitOutcome, error: impl Into<String>) -> Self {
        Self {
            outcome,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// One-line preview for status surfaces.
    ///
    /// Prefers the error marker, then the tail of stderr for failures, then
    /// the tail of stdout. Whitespace is collapsed and the result is cut to
    /// `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> String {
        let source = if let Some(err) = &self.error {
            err.as_str()
        } else if self.exit_code != Some(0) && !self.stderr.trim().is_empty() {
            self.stderr.as_str()
        } else {
            self.stdout.as_str()
        };

        let collapsed = source.split_whitespace().collect::<Vec<_>>().join(" ");
        let count = collapsed.chars().count();
        if count <= max_chars {
            collapsed
        } else {
            // Keep the tail: the end of agent output is usually the verdict.
            let skip = count - max_chars.saturating_sub(3);
            let tail: String = collapsed.chars().skip(skip).collect();
            format!("...{}", tail)
        }
    }
}
