//! Sandbox configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for running generated code.
///
/// # Isolation model
///
/// Without `isolate`, the interpreter runs with the host's ambient
/// permissions and only the timeout and process-group kill apply. With
/// `isolate`:
///
/// - **Write paths**: the scratch directory plus `write_paths`; everything
///   else is read-only.
/// - **Deny read paths**: credentials and other sensitive locations.
/// - **Network**: domain allowlist (empty = no network).
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Interpreter binary the scratch file is handed to.
    pub interpreter: String,

    /// Extra arguments placed before the scratch file path.
    pub interpreter_args: Vec<String>,

    /// Suffix of the scratch file (interpreters like Python care).
    pub file_suffix: String,

    /// Directory scratch files are created in. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// Working directory of the child. Defaults to the scratch directory.
    pub working_dir: Option<PathBuf>,

    /// Hard wall-clock limit per execution.
    pub timeout: Duration,

    /// Environment variables to pass to the child.
    pub env_vars: Vec<(String, String)>,

    /// Wrap the interpreter with OS-level isolation.
    pub isolate: bool,

    /// Additional writable paths when isolated.
    pub write_paths: Vec<PathBuf>,

    /// Paths denied for reading when isolated.
    pub deny_read_paths: Vec<PathBuf>,

    /// Allowed network domains when isolated.
    pub allowed_domains: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            interpreter_args: Vec::new(),
            file_suffix: ".py".to_string(),
            scratch_dir: None,
            working_dir: None,
            timeout: Duration::from_secs(10),
            env_vars: Vec::new(),
            isolate: false,
            write_paths: Vec::new(),
            deny_read_paths: Self::default_deny_read_paths(),
            allowed_domains: Vec::new(),
        }
    }
}

impl SandboxConfig {
    /// Create a new sandbox configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interpreter and the file suffix it expects.
    pub fn with_interpreter(mut self, interpreter: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self.file_suffix = suffix.into();
        self
    }

    /// Add an interpreter argument.
    pub fn add_interpreter_arg(mut self, arg: impl Into<String>) -> Self {
        self.interpreter_args.push(arg.into());
        self
    }

    /// Set the scratch directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an environment variable.
    pub fn add_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Enable or disable OS isolation.
    pub fn with_isolation(mut self, isolate: bool) -> Self {
        self.isolate = isolate;
        self
    }

    /// Add a writable path for isolated runs.
    pub fn add_write_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.write_paths.push(path.into());
        self
    }

    /// Set allowed network domains for isolated runs.
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = domains;
        self
    }

    /// Resolved scratch directory.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Sensitive system and user paths hidden from isolated code.
    pub fn default_deny_read_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("/etc/shadow"),
            PathBuf::from("/etc/sudoers"),
            PathBuf::from("/etc/sudoers.d"),
        ];

        if let Some(home) = dirs::home_dir() {
            for rel in [
                ".ssh",
                ".gnupg",
                ".aws",
                ".config/gcloud",
                ".kube",
                ".netrc",
                ".config/chatpilot",
            ] {
                paths.push(home.join(rel));
            }
        }

        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.file_suffix, ".py");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(!config.isolate);
        assert!(config.allowed_domains.is_empty());
        assert!(!config.deny_read_paths.is_empty());
    }

    #[test]
    fn test_builder_pattern() {
        let config = SandboxConfig::new()
            .with_interpreter("sh", ".sh")
            .add_interpreter_arg("-e")
            .with_scratch_dir("/tmp/scratch")
            .with_timeout(Duration::from_secs(3))
            .with_isolation(true)
            .add_env("MPLBACKEND", "Agg");

        assert_eq!(config.interpreter, "sh");
        assert_eq!(config.interpreter_args, vec!["-e"]);
        assert_eq!(config.scratch_dir(), PathBuf::from("/tmp/scratch"));
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert!(config.isolate);
        assert_eq!(config.env_vars.len(), 1);
    }

    #[test]
    fn test_scratch_dir_falls_back_to_temp() {
        let config = SandboxConfig::default();
        assert_eq!(config.scratch_dir(), std::env::temp_dir());
    }

    #[test]
    fn test_default_deny_paths() {
        let paths = SandboxConfig::default_deny_read_paths();
        assert!(paths.iter().any(|p| p.ends_with("shadow")));
        if dirs::home_dir().is_some() {
            assert!(paths.iter().any(|p| p.ends_with(".ssh")));
        }
    }
}
