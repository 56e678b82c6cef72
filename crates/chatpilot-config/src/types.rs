//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [llm]        # provider, model, sampling, timeouts
//! [chat]       # conversation window, system prompt
//! [analysis]   # retry budget, upload directory
//! [sandbox]    # interpreter, timeout, isolation
//! [web]        # search and fetch collaborators
//! [server]     # bind address, rate limits, session store
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chatpilot_llm::{Provider, SamplingParams};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Placeholder shown instead of secrets.
pub const REDACTED: &str = "***";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged. Accessors fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPilotConfig {
    pub llm: Option<LlmConfig>,
    pub chat: Option<ChatSection>,
    pub analysis: Option<AnalysisConfig>,
    pub sandbox: Option<SandboxSection>,
    pub web: Option<WebConfig>,
    pub server: Option<ServerConfig>,
}

impl ChatPilotConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Other(e.to_string()))
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, not field by field.
    pub fn merge(&mut self, other: ChatPilotConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.chat.is_some() {
            self.chat = other.chat;
        }
        if other.analysis.is_some() {
            self.analysis = other.analysis;
        }
        if other.sandbox.is_some() {
            self.sandbox = other.sandbox;
        }
        if other.web.is_some() {
            self.web = other.web;
        }
        if other.server.is_some() {
            self.server = other.server;
        }
    }

    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    pub fn chat(&self) -> ChatSection {
        self.chat.clone().unwrap_or_default()
    }

    pub fn analysis(&self) -> AnalysisConfig {
        self.analysis.clone().unwrap_or_default()
    }

    pub fn sandbox(&self) -> SandboxSection {
        self.sandbox.clone().unwrap_or_default()
    }

    pub fn web(&self) -> WebConfig {
        self.web.clone().unwrap_or_default()
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Apply environment overrides, reading variables through `lookup`.
    ///
    /// The LLM API key is not an override; see [`crate::resolve_api_key`].
    /// Returns a warning for each variable whose value could not be used.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("LLM_PROVIDER") {
            self.llm.get_or_insert_with(Default::default).provider = provider;
        }
        if let Some(model) = get("MODEL_NAME") {
            self.llm.get_or_insert_with(Default::default).model = model;
        }
        if let Some(enabled) = get("WEB_SEARCH_ENABLED") {
            match parse_bool(&enabled) {
                Some(value) => self.web.get_or_insert_with(Default::default).search_enabled = value,
                None => warnings.push(format!(
                    "Ignoring WEB_SEARCH_ENABLED={enabled}: expected true or false"
                )),
            }
        }
        if let Some(key) = get("WEB_SEARCH_API_KEY") {
            self.web.get_or_insert_with(Default::default).search_api_key = Some(key);
        }
        if let Some(cx) = get("CSE_ID") {
            self.web.get_or_insert_with(Default::default).cse_id = Some(cx);
        }
        if let Some(dir) = get("UPLOAD_DIR") {
            self.analysis.get_or_insert_with(Default::default).upload_dir = PathBuf::from(dir);
        }

        warnings
    }

    /// A copy safe to print: every secret is masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(llm) = config.llm.as_mut()
            && llm.api_key.is_some()
        {
            llm.api_key = Some(REDACTED.to_string());
        }
        if let Some(web) = config.web.as_mut()
            && web.search_api_key.is_some()
        {
            web.search_api_key = Some(REDACTED.to_string());
        }
        config
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Model provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name, matched by prefix (`openai*`, `anthropic*`/`claude*`, `deepseek*`).
    pub provider: String,
    pub model: String,
    /// Custom API base URL (for proxies, compatible endpoints).
    pub base_url: Option<String>,
    /// API key (prefer the `LLM_API_KEY` env var; warns if set here).
    pub api_key: Option<String>,
    /// Whole-request timeout, streaming included.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            timeout_secs: 300,
            connect_timeout_secs: 10,
            max_retries: 3,
            temperature: 0.7,
            top_p: 1.0,
            max_tokens: 1024,
        }
    }
}

impl LlmConfig {
    /// Returns true if an API key is stored directly in the config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The configured provider, or an error for an unknown name.
    pub fn provider(&self) -> Result<Provider> {
        Provider::from_name(&self.provider)
            .ok_or_else(|| ConfigError::UnknownProvider(self.provider.clone()))
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Conversation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    /// Messages kept in the model's view; `0` disables trimming.
    pub max_conversation_turns: usize,
    /// System prompt template containing `{context}`; built-in prompt when unset.
    pub system_prompt: Option<String>,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            max_conversation_turns: 20,
            system_prompt: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Analysis Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Generate-and-execute attempts per analysis request.
    pub max_retries: u32,
    /// Root directory for uploaded files, one subdirectory per session.
    pub upload_dir: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sandbox Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    pub interpreter: String,
    pub timeout_secs: u64,
    /// Wrap the interpreter with OS-level isolation when available.
    pub isolate: bool,
    /// Hosts reachable from isolated code.
    pub allowed_domains: Vec<String>,
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_secs: 10,
            isolate: false,
            allowed_domains: Vec::new(),
        }
    }
}

impl SandboxSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Web Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub search_enabled: bool,
    pub search_api_key: Option<String>,
    /// Google Custom Search engine id.
    pub cse_id: Option<String>,
    pub num_results: u32,
    pub fetch_timeout_secs: u64,
    /// Fetched pages are truncated to this many characters.
    pub max_text_length: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            search_enabled: false,
            search_api_key: None,
            cse_id: None,
            num_results: 5,
            fetch_timeout_secs: 30,
            max_text_length: 50_000,
        }
    }
}

impl WebConfig {
    /// Search credentials, when search is enabled and fully configured.
    pub fn search_credentials(&self) -> Option<(&str, &str)> {
        if !self.search_enabled {
            return None;
        }
        let key = self.search_api_key.as_deref().filter(|k| !k.is_empty())?;
        let cx = self.cse_id.as_deref().filter(|c| !c.is_empty())?;
        Some((key, cx))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Enable rate limiting on the chat endpoint.
    pub rate_limiting: bool,
    /// Chat requests per minute.
    pub chat_rpm: u32,
    /// Sessions kept in memory before LRU eviction.
    pub session_max: usize,
    /// Idle time after which a session expires.
    pub session_ttl_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            rate_limiting: true,
            chat_rpm: 10,
            session_max: 10_000,
            session_ttl_secs: None,
        }
    }
}

impl ServerConfig {
    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl_secs.map(Duration::from_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ChatPilotConfig::new();
        let llm = config.llm();
        assert_eq!(llm.provider().unwrap(), Provider::OpenAi);
        assert_eq!(llm.model, "gpt-4o-mini");
        assert_eq!(llm.timeout(), Duration::from_secs(300));
        assert_eq!(llm.sampling().max_tokens, 1024);
        assert_eq!(config.chat().max_conversation_turns, 20);
        assert_eq!(config.analysis().max_retries, 3);
        assert_eq!(config.sandbox().interpreter, "python3");
        assert_eq!(config.sandbox().timeout(), Duration::from_secs(10));
        assert_eq!(config.web().max_text_length, 50_000);
        assert_eq!(config.server().bind_address, "127.0.0.1:8000");
        assert_eq!(config.server().session_ttl(), None);
    }

    #[test]
    fn test_parse_partial_sections() {
        let config = ChatPilotConfig::from_toml(
            r#"
[llm]
provider = "claude"
model = "claude-3-5-sonnet-latest"

[sandbox]
isolate = true
allowed_domains = ["pypi.org"]

[server]
chat_rpm = 30
session_ttl_secs = 3600
"#,
        )
        .unwrap();

        let llm = config.llm();
        assert_eq!(llm.provider().unwrap(), Provider::Anthropic);
        assert_eq!(llm.max_retries, 3);
        assert!(config.sandbox().isolate);
        assert_eq!(config.sandbox().allowed_domains, vec!["pypi.org"]);
        assert_eq!(config.server().chat_rpm, 30);
        assert_eq!(
            config.server().session_ttl(),
            Some(Duration::from_secs(3600))
        );
        assert!(config.chat.is_none());
    }

    #[test]
    fn test_unknown_provider() {
        let config = ChatPilotConfig::from_toml("[llm]\nprovider = \"ollama\"\n").unwrap();
        assert!(matches!(
            config.llm().provider(),
            Err(ConfigError::UnknownProvider(name)) if name == "ollama"
        ));
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = ChatPilotConfig::from_toml(
            "[llm]\nmodel = \"base\"\n\n[server]\nchat_rpm = 5\n",
        )
        .unwrap();
        let overlay = ChatPilotConfig::from_toml("[llm]\nprovider = \"deepseek\"\n").unwrap();
        base.merge(overlay);

        assert_eq!(base.llm().provider, "deepseek");
        // Section replaced whole: model back to default.
        assert_eq!(base.llm().model, "gpt-4o-mini");
        assert_eq!(base.server().chat_rpm, 5);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ChatPilotConfig::new();
        let warnings = config.apply_env_overrides(env(&[
            ("LLM_PROVIDER", "anthropic"),
            ("MODEL_NAME", "claude-3-haiku"),
            ("WEB_SEARCH_ENABLED", "true"),
            ("WEB_SEARCH_API_KEY", "g-key"),
            ("CSE_ID", "cx"),
            ("UPLOAD_DIR", "/srv/uploads"),
        ]));

        assert!(warnings.is_empty());
        let llm = config.llm();
        assert_eq!(llm.provider, "anthropic");
        assert_eq!(llm.model, "claude-3-haiku");
        assert_eq!(llm.api_key, None);
        assert_eq!(config.web().search_credentials(), Some(("g-key", "cx")));
        assert_eq!(config.analysis().upload_dir, PathBuf::from("/srv/uploads"));
    }

    #[test]
    fn test_env_override_bad_bool_warns() {
        let mut config = ChatPilotConfig::new();
        let warnings = config.apply_env_overrides(env(&[("WEB_SEARCH_ENABLED", "maybe")]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("WEB_SEARCH_ENABLED"));
        assert!(config.web.is_none());
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let mut config = ChatPilotConfig::new();
        config.apply_env_overrides(env(&[("MODEL_NAME", "  ")]));
        assert!(config.llm.is_none());
    }

    #[test]
    fn test_search_credentials_require_everything() {
        let mut web = WebConfig {
            search_api_key: Some("k".into()),
            cse_id: Some("cx".into()),
            ..Default::default()
        };
        assert_eq!(web.search_credentials(), None);
        web.search_enabled = true;
        assert_eq!(web.search_credentials(), Some(("k", "cx")));
        web.cse_id = Some(String::new());
        assert_eq!(web.search_credentials(), None);
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = ChatPilotConfig::new();
        config.llm = Some(LlmConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        });
        config.apply_env_overrides(env(&[("WEB_SEARCH_API_KEY", "g-secret")]));

        let printed = config.redacted().to_toml().unwrap();
        assert!(!printed.contains("sk-secret"));
        assert!(!printed.contains("g-secret"));
        assert!(printed.contains(REDACTED));
        // The original is untouched.
        assert_eq!(config.llm().api_key.as_deref(), Some("sk-secret"));
    }
}
