//! CLI command handlers.

pub mod config;
pub mod start;

use std::path::PathBuf;

use anyhow::Result;
use chatpilot_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file from `--config`.
    pub config_path: Option<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Discover and merge configuration, logging any warnings.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = chatpilot_config::load_config(self.config_path.as_deref())?;
        for warning in &loaded.warnings {
            tracing::warn!("{warning}");
        }
        Ok(loaded)
    }
}
