//! Exit code constants for the isotask CLI.
//!
//! - 0: Success (every task completed)
//! - 1: User error (bad args, missing state, unknown task)
//! - 2: Task list could not be parsed
//! - 3: Partial failure (run finished, some task failed or timed out)
//! - 4: Internal error (store protocol violation, process tree survived)
//! - 5: Run lock held by another process
//! - 130: Cancelled by signal

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid base directory state.
pub const USER_ERROR: i32 = 1;

/// Parse failure: malformed headings or an empty task list.
pub const PARSE_FAILURE: i32 = 2;

/// The run finished but not every task completed.
pub const PARTIAL_FAILURE: i32 = 3;

/// A core-logic invariant was violated.
pub const INTERNAL_ERROR: i32 = 4;

/// Lock acquisition failure.
pub const LOCK_FAILURE: i32 = 5;

/// Interrupted (SIGINT convention).
pub const CANCELLED: i32 = 130;
