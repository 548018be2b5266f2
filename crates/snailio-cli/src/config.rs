//! `snailio.toml` configuration file.
//!
//! ```toml
//! [scheduler]
//! default_task_timeout_ms = 500
//! max_cycles = 1000000
//! ```

use anyhow::Context;
use serde::Deserialize;
use snailio_engine::SchedulerConfig;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// `[scheduler]` table
    pub scheduler: SchedulerSection,
}

/// `[scheduler]` table
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSection {
    /// Timeout for tasks created without one, in milliseconds
    pub default_task_timeout_ms: Option<u64>,

    /// Cycle budget for a single run
    pub max_cycles: Option<u64>,
}

impl CliConfig {
    /// Parse a configuration from TOML text.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Load `path` if given, otherwise use defaults.
    pub fn load_optional(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Scheduler configuration described by this file
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            default_task_timeout: self
                .scheduler
                .default_task_timeout_ms
                .map(Duration::from_millis),
            max_cycles: self.scheduler.max_cycles,
        }
    }
}
