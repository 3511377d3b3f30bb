//! Config loading, validation, and override operations.

use super::model::Config;
use super::types::OutputMode;
use crate::context::RunContext;
use crate::error::{Result, RunnerError};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Values given on the command line. `None` leaves the config value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub timeout_seconds: Option<u64>,
    pub agent_command: Option<String>,
    pub no_stdin: bool,
    pub output_mode: Option<OutputMode>,
}

impl Config {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            RunnerError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content).map_err(|e| {
            RunnerError::UserError(format!("{} (in '{}')", e, path.display()))
        })
    }

    /// Resolve the config for a command.
    ///
    /// An explicit path must exist. Otherwise `<base>/config.yaml` is used when
    /// present, and built-in defaults when not.
    pub fn resolve(ctx: &RunContext, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let path = ctx.config_path();
        if path.exists() {
            debug!(path = %path.display(), "loading config");
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| RunnerError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides, then re-validate.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Result<Self> {
        if let Some(secs) = overrides.timeout_seconds {
            self.timeout_seconds = secs;
        }
        if let Some(command) = &overrides.agent_command {
            self.agent.command = command.clone();
        }
        if overrides.no_stdin {
            self.agent.stdin = false;
        }
        if let Some(mode) = overrides.output_mode {
            self.output_mode = mode;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate config values and return error on invalid values.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| {
            Err(RunnerError::UserError(format!(
                "config validation failed: {}",
                msg
            )))
        };

        if self.timeout_seconds == 0 {
            return invalid("timeout_seconds must be greater than 0".to_string());
        }
        if self.agent.command.trim().is_empty() {
            return invalid("agent.command must not be empty".to_string());
        }
        if self.supervisor.poll_interval_ms == 0 {
            return invalid("supervisor.poll_interval_ms must be greater than 0".to_string());
        }
        if self.supervisor.reap_timeout_ms == 0 {
            return invalid("supervisor.reap_timeout_ms must be greater than 0".to_string());
        }
        if self.preview_chars < 8 {
            return invalid(format!(
                "preview_chars must be at least 8 (found {})",
                self.preview_chars
            ));
        }
        for key in self.agent.environment.keys() {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return invalid(format!(
                    "agent.environment has an invalid variable name '{}'",
                    key
                ));
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn inter_task_delay(&self) -> Duration {
        Duration::from_millis(self.inter_task_delay_ms)
    }
}
