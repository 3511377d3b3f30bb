//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for an isotask base directory.
///
/// This struct represents the contents of `<base>/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Execution settings
    // =========================================================================
    /// Wall-clock limit per task, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Pause between two tasks, in milliseconds.
    #[serde(default)]
    pub inter_task_delay_ms: u64,

    /// Halt the run after this many spawn failures in a row (0 disables).
    #[serde(default = "default_max_consecutive_spawn_failures")]
    pub max_consecutive_spawn_failures: u32,

    // =========================================================================
    // Agent settings
    // =========================================================================
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub supervisor: SupervisorConfig,

    // =========================================================================
    // Reporting settings
    // =========================================================================
    #[serde(default)]
    pub output_mode: OutputMode,

    /// Length of the output preview in status listings.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            inter_task_delay_ms: 0,
            max_consecutive_spawn_failures: default_max_consecutive_spawn_failures(),
            agent: AgentConfig::default(),
            supervisor: SupervisorConfig::default(),
            output_mode: OutputMode::default(),
            preview_chars: default_preview_chars(),
        }
    }
}
