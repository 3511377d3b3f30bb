//! Error types for isotask.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//! Per-task runtime failures (non-zero exit, timeout, spawn failure) are not
//! errors here: they end up as terminal task state. What remains are the
//! conditions that abort a command.

use crate::exit_codes;
use crate::task::TaskState;
use thiserror::Error;

/// Main error type for isotask operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The task list has a malformed heading structure.
    #[error("parse error at line {line}: {reason}\n  | {context}")]
    ParseError {
        /// 1-based line number of the offending line.
        line: usize,
        /// The offending line, verbatim.
        context: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The task list contains no heading-delimited task section.
    #[error("task list contains no tasks (expected at least one heading-delimited section)")]
    EmptyTaskList,

    /// The task store was initialized twice in one run.
    #[error("task store is already initialized for this run")]
    AlreadyInitialized,

    /// A state change would violate the task lifecycle.
    #[error("invalid transition for task '{id}': {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: TaskState,
        to: TaskState,
    },

    /// No task with this id exists in the run.
    #[error("task '{0}' not found")]
    UnknownTask(String),

    /// The external agent could not be launched.
    #[error("failed to spawn agent '{program}': {reason}")]
    SpawnError { program: String, reason: String },

    /// The run was stopped by an external signal.
    #[error("run cancelled")]
    CancellationRequested,

    /// A process group survived every kill attempt.
    #[error("process group {pgid} survived termination")]
    TerminationFailed { pgid: i32 },

    /// Another run holds the run lock.
    #[error("lock acquisition failed: {0}")]
    LockError(String),

    /// User provided invalid arguments or the base directory is in an invalid state.
    #[error("{0}")]
    UserError(String),
}

impl RunnerError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunnerError::ParseError { .. } | RunnerError::EmptyTaskList => {
                exit_codes::PARSE_FAILURE
            }
            RunnerError::AlreadyInitialized
            | RunnerError::InvalidTransition { .. }
            | RunnerError::TerminationFailed { .. } => exit_codes::INTERNAL_ERROR,
            RunnerError::UnknownTask(_)
            | RunnerError::SpawnError { .. }
            | RunnerError::UserError(_) => exit_codes::USER_ERROR,
            RunnerError::CancellationRequested => exit_codes::CANCELLED,
            RunnerError::LockError(_) => exit_codes::LOCK_FAILURE,
        }
    }
}

/// Result type alias for isotask operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
