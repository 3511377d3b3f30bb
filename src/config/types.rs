//! Configuration types and defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How progress is reported on the terminal. Has no effect on execution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// One line per task transition.
    #[default]
    Plain,
    /// The final report as a JSON document.
    Json,
    /// The status table, re-printed after each transition.
    Dashboard,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputMode::Plain => "plain",
            OutputMode::Json => "json",
            OutputMode::Dashboard => "dashboard",
        })
    }
}

/// How the external agent is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Command template. Available variables: `{task_id}`, `{task_file}`,
    /// `{title}`, `{work_dir}`, `{attempt}`.
    pub command: String,

    /// Feed the task artifact to the agent on stdin.
    pub stdin: bool,

    /// Extra environment variables for the agent.
    pub environment: BTreeMap<String, String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            stdin: true,
            environment: BTreeMap::new(),
        }
    }
}

/// Supervision loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Upper bound on how long the loop sleeps between checks.
    pub poll_interval_ms: u64,

    /// Time between SIGTERM and SIGKILL when tearing down a process group.
    pub kill_grace_ms: u64,

    /// How long to wait for a killed process group to disappear.
    pub reap_timeout_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            kill_grace_ms: 2000,
            reap_timeout_ms: 5000,
        }
    }
}

pub fn default_agent_command() -> String {
    "claude --print".to_string()
}

pub fn default_timeout_seconds() -> u64 {
    300
}

pub fn default_max_consecutive_spawn_failures() -> u32 {
    3
}

pub fn default_preview_chars() -> usize {
    200
}
