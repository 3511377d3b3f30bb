//! Base directory resolution for isotask.
//!
//! Every run lives under one base directory (default `./.isotask`). This
//! module resolves it to an absolute path and derives the canonical locations
//! of task artifacts, results, working directories, state and locks, so that
//! no other module builds these paths by hand.

use crate::error::{Result, RunnerError};
use std::env;
use std::path::{Path, PathBuf};

/// Default base directory relative to the current working directory.
pub const DEFAULT_BASE_DIR: &str = ".isotask";

/// Resolved paths for one isotask base directory. All paths are absolute.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Root of the run (default: `{cwd}/.isotask/`).
    pub base_dir: PathBuf,

    /// Isolated per-task artifacts (`{base}/tasks/`).
    pub tasks_dir: PathBuf,

    /// Captured output per task (`{base}/results/`).
    pub results_dir: PathBuf,

    /// Fresh working directories per task attempt (`{base}/work/`).
    pub work_dir: PathBuf,
}

impl RunContext {
    /// Resolve the context for an explicit base directory, or the default
    /// under the current working directory.
    pub fn resolve(base_dir: Option<&Path>) -> Result<Self> {
        let base = match base_dir {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => current_dir()?.join(dir),
            None => current_dir()?.join(DEFAULT_BASE_DIR),
        };
        Ok(Self::at(base))
    }

    /// Build a context rooted at `base_dir` without touching the filesystem.
    pub fn at<P: AsRef<Path>>(base_dir: P) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        Self {
            tasks_dir: base_dir.join("tasks"),
            results_dir: base_dir.join("results"),
            work_dir: base_dir.join("work"),
            base_dir,
        }
    }

    /// Create the directory layout if it does not exist yet.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [&self.base_dir, &self.tasks_dir, &self.results_dir, &self.work_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                RunnerError::UserError(format!(
                    "failed to create directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Path to the optional config file.
    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join("config.yaml")
    }

    /// Path to the persisted store snapshot.
    pub fn state_path(&self) -> PathBuf {
        self.base_dir.join("state.json")
    }

    /// Path to the audit event log.
    pub fn events_file(&self) -> PathBuf {
        self.base_dir.join("events.ndjson")
    }

    /// Path to the exclusive run lock.
    pub fn run_lock_path(&self) -> PathBuf {
        self.base_dir.join("run.lock")
    }

    /// Isolated artifact for a task.
    pub fn task_file(&self, task_id: &str) -> PathBuf {
        self.tasks_dir.join(format!("{}.md", task_id))
    }

    /// Captured stdout for a task.
    pub fn result_file(&self, task_id: &str) -> PathBuf {
        self.results_dir.join(format!("{}.result", task_id))
    }

    /// Captured stderr for a task.
    pub fn error_file(&self, task_id: &str) -> PathBuf {
        self.results_dir.join(format!("{}.error", task_id))
    }

    /// Working directory handed to the agent for a task.
    pub fn task_work_dir(&self, task_id: &str) -> PathBuf {
        self.work_dir.join(task_id)
    }

    /// Fail with a helpful message when no run has been started here.
    pub fn ensure_state_exists(&self) -> Result<()> {
        if !self.state_path().exists() {
            return Err(RunnerError::UserError(format!(
                "no run state found at '{}'.\n\n\
                 Run `isotask run <TASK_LIST>` to start a run in this base directory.",
                self.state_path().display()
            )));
        }
        Ok(())
    }
}

fn current_dir() -> Result<PathBuf> {
    env::current_dir().map_err(|e| {
        RunnerError::UserError(format!("failed to get current working directory: {}", e))
    })
}
