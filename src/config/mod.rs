//! Configuration model for isotask.
//!
//! This module defines the Config struct that represents `<base>/config.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! defaults for every field, and validation of config values. Command-line
//! flags are layered on top with [`Overrides`].

mod model;
mod operations;
pub mod types;


pub use model::Config;
pub use operations::Overrides;
pub use types::{AgentConfig, OutputMode, SupervisorConfig};
