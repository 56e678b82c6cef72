//! Configuration system for ChatPilot.
//!
//! Provides TOML-based configuration with:
//! - One section per concern (`[llm]`, `[chat]`, `[analysis]`, `[sandbox]`, `[web]`, `[server]`)
//! - Config file layering (XDG user config, project-local file, explicit path)
//! - Environment variable overrides for deployment
//! - API key resolution (env var → config file)

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadOptions, LoadedConfig, load_config, load_config_file, load_config_with_options,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{
    API_KEY_ENV, ResolvedSecret, SecretSource, provider_env_var, resolve_api_key,
    resolve_api_key_with,
};
pub use types::*;
