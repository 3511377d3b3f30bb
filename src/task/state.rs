//! Task lifecycle states and the transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a task unit.
///
/// Transitions are monotonic: `Pending -> Running -> {Completed | Failed | TimedOut}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

/// Every state, in lifecycle order. Used for summaries and rendering.
pub const ALL_STATES: &[TaskState] = &[
    TaskState::Pending,
    TaskState::Running,
    TaskState::Completed,
    TaskState::Failed,
    TaskState::TimedOut,
];

impl TaskState {
    /// Whether no further transition can happen without an explicit re-run.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::TimedOut
        )
    }

    /// Whether `self -> next` is a legal lifecycle step.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        match (self, next) {
            (TaskState::Pending, TaskState::Running) => true,
            (TaskState::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Short lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
