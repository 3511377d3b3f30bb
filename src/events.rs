//! Append-only audit log of run activity.
//!
//! Events are stored as NDJSON (one JSON object per line) in
//! `<base>/events.ndjson`. Each record carries:
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (`run_started`, `task_started`, ...)
//! - `actor`: the owner string (`user@HOST`)
//! - `task`: task id for task-specific events
//! - `details`: action-specific fields
//!
//! The log is written by the orchestrator while it holds the run lock, so
//! lines from two runs never interleave.

use crate::context::RunContext;
use crate::error::{Result, RunnerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Run loop entered.
    RunStarted,
    /// Task moved to `Running`.
    TaskStarted,
    /// Task reached a terminal state.
    TaskFinished,
    /// Terminal task returned to `Pending` for an explicit re-run.
    TaskReset,
    /// Run loop left, normally or by halt.
    RunFinished,
    /// Artifacts removed by `isotask clean`.
    Clean,
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,

    pub action: EventAction,

    /// Who ran the command (`user@HOST`).
    pub actor: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    #[serde(default)]
    pub details: Value,
}

impl Event {
    /// Create an event stamped with the current time and actor.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor_string(),
            task: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task = Some(task_id.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            RunnerError::UserError(format!("failed to serialize event to JSON: {}", e))
        })
    }
}

/// `user@host` for event and lock metadata.
pub fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append one event as a line to `events.ndjson`, creating the file if needed.
pub fn append_event(ctx: &RunContext, event: &Event) -> Result<()> {
    let path = ctx.events_file();
    let line = event.to_ndjson_line()?;

    std::fs::create_dir_all(&ctx.base_dir).map_err(|e| {
        RunnerError::UserError(format!(
            "failed to create base directory '{}': {}",
            ctx.base_dir.display(),
            e
        ))
    })?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| {
            RunnerError::UserError(format!(
                "failed to open events file '{}': {}",
                path.display(),
                e
            ))
        })?;

    writeln!(file, "{}", line).map_err(|e| {
        RunnerError::UserError(format!(
            "failed to write event to '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.sync_all().map_err(|e| {
        RunnerError::UserError(format!(
            "failed to sync events file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Read every event in the log, oldest first. A missing log is empty.
pub fn read_events(ctx: &RunContext) -> Result<Vec<Event>> {
    let path = ctx.events_file();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        RunnerError::UserError(format!(
            "failed to read events file '{}': {}",
            path.display(),
            e
        ))
    })?;

    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| {
                RunnerError::UserError(format!(
                    "malformed event on line {} of '{}': {}",
                    i + 1,
                    path.display(),
                    e
                ))
            })
        })
        .collect()
}
