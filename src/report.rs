//! Terminal rendering of run progress and status.
//!
//! Nothing here affects execution: the orchestrator pushes transitions into
//! a [`StatusObserver`] and commands print the final snapshot.

use crate::error::{Result, RunnerError};
use crate::orchestrator::{HaltReason, StatusObserver};
use crate::store::{StatusSnapshot, SummaryStats};
use crate::task::{TaskState, TaskUnit};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write};

/// Longest title shown in the status table.
const TITLE_WIDTH: usize = 32;

/// One line per transition.
pub struct PlainObserver;

impl StatusObserver for PlainObserver {
    fn on_transition(&mut self, task: &TaskUnit, stats: &SummaryStats) {
        println!("{}", transition_line(task, stats));
    }
}

/// Re-prints the whole status table after each transition.
pub struct DashboardObserver {
    tasks: Vec<TaskUnit>,
    preview_chars: usize,
}

impl DashboardObserver {
    pub fn new(tasks: &[TaskUnit], preview_chars: usize) -> Self {
        Self {
            tasks: tasks.to_vec(),
            preview_chars,
        }
    }
}

impl StatusObserver for DashboardObserver {
    fn on_transition(&mut self, task: &TaskUnit, _stats: &SummaryStats) {
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task.clone();
        }
        let snapshot = StatusSnapshot::from_tasks(&self.tasks, self.preview_chars);

        // ANSI clear + home, as a refresh-style dashboard.
        print!("\x1B[2J\x1B[H");
        print!("{}", render_table(&snapshot));
        let _ = io::stdout().flush();
    }
}

/// `[2/5] 002_write_docs completed (exit 0, 1.4s)`
pub fn transition_line(task: &TaskUnit, stats: &SummaryStats) -> String {
    let mut line = format!(
        "[{}/{}] {} {}",
        task.ordinal, stats.total, task.id, task.state
    );

    match task.state {
        TaskState::Running => {
            let _ = write!(line, " (attempt {})", task.attempt);
        }
        _ => {
            if let Some(summary) = &task.exit_summary {
                let exit = summary
                    .exit_code
                    .map(|c| format!("exit {}", c))
                    .unwrap_or_else(|| "no exit code".to_string());
                let _ = write!(
                    line,
                    " ({}, {})",
                    exit,
                    format_duration_ms(summary.duration_ms)
                );
                if let Some(error) = &summary.error {
                    let _ = write!(line, ": {}", first_line(error));
                }
            }
        }
    }
    line
}

/// Fixed-width status table followed by the summary line.
pub fn render_table(snapshot: &StatusSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<28} {:<TITLE_WIDTH$} {:<10} {:>7} {:>5}  {}",
        "ID", "TITLE", "STATE", "ATTEMPT", "EXIT", "OUTPUT"
    );

    for task in &snapshot.tasks {
        let exit = task
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<28} {:<TITLE_WIDTH$} {:<10} {:>7} {:>5}  {}",
            task.id,
            truncate(&task.title, TITLE_WIDTH),
            task.state.as_str(),
            task.attempt,
            exit,
            task.exit_summary_preview.as_deref().unwrap_or("")
        );
    }

    out.push('\n');
    out.push_str(&summary_line(&snapshot.summary));
    out.push('\n');
    out
}

/// `3 tasks: 2 completed, 1 failed, 0 timed out, 0 pending (100%)`
pub fn summary_line(stats: &SummaryStats) -> String {
    let mut line = format!(
        "{} tasks: {} completed, {} failed, {} timed out, {} pending",
        stats.total, stats.completed, stats.failed, stats.timed_out, stats.pending
    );
    if stats.running > 0 {
        let _ = write!(line, ", {} running", stats.running);
    }
    let _ = write!(line, " ({:.0}%)", stats.completion_pct);
    line
}

/// Message for a run that stopped early.
pub fn halt_line(reason: &HaltReason) -> String {
    match reason {
        HaltReason::SpawnFailures { .. } => format!(
            "Run halted: {}. Check the agent command (`agent.command` or --agent).",
            reason
        ),
        HaltReason::Cancelled => {
            "Run cancelled. Continue with `isotask run --resume`.".to_string()
        }
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| RunnerError::UserError(format!("failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
