//! Read-only projections of the store for reporting.

use crate::task::{TaskState, TaskUnit};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregate counts per state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Share of tasks in a terminal state, 0.0 to 100.0.
    pub completion_pct: f64,
    /// Every task is terminal.
    pub complete: bool,
    /// Every task is `Completed`.
    pub success: bool,
}

impl SummaryStats {
    pub fn from_tasks(tasks: &[TaskUnit]) -> Self {
        let mut stats = SummaryStats {
            total: tasks.len(),
            ..Default::default()
        };

        for task in tasks {
            match task.state {
                TaskState::Pending => stats.pending += 1,
                TaskState::Running => stats.running += 1,
                TaskState::Completed => stats.completed += 1,
                TaskState::Failed => stats.failed += 1,
                TaskState::TimedOut => stats.timed_out += 1,
            }
        }

        let terminal = stats.completed + stats.failed + stats.timed_out;
        stats.completion_pct = if stats.total == 0 {
            0.0
        } else {
            terminal as f64 * 100.0 / stats.total as f64
        };
        stats.complete = stats.total > 0 && terminal == stats.total;
        stats.success = stats.total > 0 && stats.completed == stats.total;
        stats
    }

    /// Number of tasks in `state`.
    pub fn count(&self, state: TaskState) -> usize {
        match state {
            TaskState::Pending => self.pending,
            TaskState::Running => self.running,
            TaskState::Completed => self.completed,
            TaskState::Failed => self.failed,
            TaskState::TimedOut => self.timed_out,
        }
    }

    /// Run finished but at least one task did not complete.
    pub fn partially_failed(&self) -> bool {
        self.complete && !self.success
    }
}

/// Status of one task as shown to reporting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatus {
    pub id: String,
    pub title: String,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_summary_preview: Option<String>,
}

/// Point-in-time view of the whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub tasks: Vec<TaskStatus>,
    pub summary: SummaryStats,
}

impl StatusSnapshot {
    pub fn from_tasks(tasks: &[TaskUnit], preview_chars: usize) -> Self {
        let statuses = tasks
            .iter()
            .map(|t| TaskStatus {
                id: t.id.clone(),
                title: t.title.clone(),
                state: t.state,
                started_at: t.started_at,
                ended_at: t.ended_at,
                attempt: t.attempt,
                exit_code: t.exit_summary.as_ref().and_then(|s| s.exit_code),
                exit_summary_preview: t
                    .exit_summary
                    .as_ref()
                    .map(|s| s.preview(preview_chars)),
            })
            .collect();

        Self {
            tasks: statuses,
            summary: SummaryStats::from_tasks(tasks),
        }
    }

    pub fn get(&self, id: &str) -> Option<&TaskStatus> {
        self.tasks.iter().find(|t| t.id == id)
    }
}
