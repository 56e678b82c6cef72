//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/chatpilot/config.toml` (XDG user config)
//! 2. `./chatpilot.toml` (project-local)
//! 3. An explicit `--config` path
//! 4. Environment variables

use std::path::{Path, PathBuf};

use crate::{ChatPilotConfig, ConfigError, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "chatpilot.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "chatpilot";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "CHATPILOT_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: ChatPilotConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (e.g., plaintext API keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Where to look for config layers.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory holding `chatpilot.toml`; the working directory when unset.
    pub project_dir: Option<PathBuf>,
    /// User config directory; `CHATPILOT_CONFIG_DIR` or the platform default when unset.
    pub config_dir: Option<PathBuf>,
    /// Explicit config file. Must exist.
    pub explicit: Option<PathBuf>,
}

/// Discover, merge and apply environment overrides from the process environment.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let options = LoadOptions {
        explicit: explicit.map(Path::to_path_buf),
        ..Default::default()
    };
    load_config_with_options(&options, |name| std::env::var(name).ok())
}

/// Load configuration with explicit control over every layer.
///
/// A malformed discovered file is a warning; a missing or malformed explicit
/// file is an error.
pub fn load_config_with_options<F>(options: &LoadOptions, env: F) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ChatPilotConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config
    let user_config_path = match &options.config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project-local config
    let project_path = options
        .project_dir
        .as_ref()
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    // 3. Explicit file
    if let Some(path) = &options.explicit {
        config.merge(load_config_file(path)?);
        sources.push(ConfigSource {
            path: path.clone(),
            loaded: true,
        });
    }

    check_plaintext_keys(&config, &mut warnings);

    // 4. Environment
    warnings.extend(config.apply_env_overrides(env));

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<ChatPilotConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    ChatPilotConfig::from_toml(&contents)
}

/// Get the user config file path for chatpilot.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the user config directory for chatpilot.
///
/// Checks `CHATPILOT_CONFIG_DIR` first, then falls back to the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut ChatPilotConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    let loaded = match load_config_file(path) {
        Ok(layer) => {
            tracing::debug!(path = %path.display(), "Loaded config layer");
            config.merge(layer);
            true
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            false
        }
    };
    ConfigSource {
        path: path.to_path_buf(),
        loaded,
    }
}

fn check_plaintext_keys(config: &ChatPilotConfig, warnings: &mut Vec<String>) {
    if let Some(llm) = &config.llm
        && llm.has_plaintext_api_key()
    {
        warnings.push(
            "[llm] contains a plaintext API key. \
             Consider the LLM_API_KEY environment variable instead."
                .to_string(),
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    /// Options isolated from the real user config and working directory.
    fn isolated(project: &TempDir, user: &TempDir) -> LoadOptions {
        LoadOptions {
            project_dir: Some(project.path().to_path_buf()),
            config_dir: Some(user.path().to_path_buf()),
            explicit: None,
        }
    }

    #[test]
    fn test_xdg_config_path_shape() {
        if let Some(p) = xdg_config_path() {
            assert!(p.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/chatpilot.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();

        let loaded = load_config_with_options(&isolated(&project, &user), no_env).unwrap();
        assert_eq!(loaded.config, ChatPilotConfig::new());
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_layers_in_order() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let explicit_dir = TempDir::new().unwrap();

        fs::write(
            user.path().join("config.toml"),
            "[llm]\nmodel = \"user-model\"\n\n[server]\nchat_rpm = 1\n\n[web]\nnum_results = 3\n",
        )
        .unwrap();
        fs::write(
            project.path().join("chatpilot.toml"),
            "[llm]\nmodel = \"project-model\"\n\n[server]\nchat_rpm = 2\n",
        )
        .unwrap();
        let explicit = explicit_dir.path().join("prod.toml");
        fs::write(&explicit, "[server]\nchat_rpm = 3\n").unwrap();

        let options = LoadOptions {
            explicit: Some(explicit.clone()),
            ..isolated(&project, &user)
        };
        let loaded = load_config_with_options(&options, no_env).unwrap();

        assert_eq!(loaded.config.llm().model, "project-model");
        assert_eq!(loaded.config.server().chat_rpm, 3);
        assert_eq!(loaded.config.web().num_results, 3);
        assert_eq!(loaded.loaded_from().len(), 3);
        assert_eq!(loaded.loaded_from()[2], explicit.as_path());
    }

    #[test]
    fn test_env_beats_files() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(
            project.path().join("chatpilot.toml"),
            "[llm]\nprovider = \"openai\"\n",
        )
        .unwrap();

        let loaded = load_config_with_options(&isolated(&project, &user), |name| {
            (name == "LLM_PROVIDER").then(|| "deepseek".to_string())
        })
        .unwrap();
        assert_eq!(loaded.config.llm().provider, "deepseek");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let options = LoadOptions {
            explicit: Some(project.path().join("missing.toml")),
            ..isolated(&project, &user)
        };
        assert!(matches!(
            load_config_with_options(&options, no_env),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    fn test_malformed_discovered_file_warns_but_continues() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(project.path().join("chatpilot.toml"), "not valid toml {{{{").unwrap();

        let loaded = load_config_with_options(&isolated(&project, &user), no_env).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Failed to load"));
        assert!(loaded.loaded_from().is_empty());
    }

    #[test]
    fn test_plaintext_key_warning() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(
            project.path().join("chatpilot.toml"),
            "[llm]\napi_key = \"sk-secret\"\n",
        )
        .unwrap();

        let loaded = load_config_with_options(&isolated(&project, &user), no_env).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("plaintext"));
    }
}
