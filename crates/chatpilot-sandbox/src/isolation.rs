//! Thin wrapper over `sandbox-runtime`.

use std::path::Path;

use sandbox_runtime::{
    FilesystemConfig, NetworkConfig, SandboxManager as RuntimeSandboxManager, SandboxRuntimeConfig,
};

use crate::config::SandboxConfig;
use crate::error::{SandboxError, SandboxResult};
use crate::platform::{Platform, SandboxStatus};

/// An initialized isolation runtime.
///
/// The policy is fixed for the executor's lifetime, so the runtime is
/// initialized once and only wraps commands afterwards.
pub(crate) struct Isolation {
    runtime: RuntimeSandboxManager,
    platform: Platform,
}

impl Isolation {
    pub(crate) async fn new(config: &SandboxConfig) -> SandboxResult<Self> {
        let platform = match SandboxStatus::detect() {
            SandboxStatus::Available { platform } => platform,
            SandboxStatus::MissingDependency {
                missing,
                install_hint,
                ..
            } => {
                return Err(SandboxError::Unavailable {
                    message: format!("Missing dependencies: {}", missing.join(", ")),
                    install_hint,
                });
            }
            SandboxStatus::Unsupported { platform_name } => {
                return Err(SandboxError::Unavailable {
                    message: format!("Platform not supported: {platform_name}"),
                    install_hint: "Isolation is only available on macOS and Linux.".to_string(),
                });
            }
        };

        let runtime = RuntimeSandboxManager::new();
        runtime
            .initialize(runtime_config(config))
            .await
            .map_err(|e| SandboxError::InitializationFailed(e.to_string()))?;

        tracing::info!(%platform, "Sandbox isolation initialized");
        Ok(Self { runtime, platform })
    }

    pub(crate) fn platform(&self) -> Platform {
        self.platform
    }

    /// Wrap `argv` into a shell command string confined by the runtime.
    pub(crate) async fn wrap(&self, argv: &[String]) -> SandboxResult<String> {
        let command = shell_words::join(argv);
        let wrapped = self
            .runtime
            .wrap_with_sandbox(&command, None, None)
            .await
            .map_err(|e| SandboxError::Runtime(e.to_string()))?;

        tracing::debug!(original = %command, wrapped = %wrapped, "Wrapped command with sandbox");
        Ok(wrapped)
    }

    pub(crate) async fn shutdown(&self) {
        self.runtime.reset().await;
    }
}

fn runtime_config(config: &SandboxConfig) -> SandboxRuntimeConfig {
    let scratch = config.scratch_dir();
    let allow_write = std::iter::once(scratch.as_path())
        .chain(config.write_paths.iter().map(|p| p.as_path()))
        .map(path_string)
        .collect();

    let filesystem = FilesystemConfig {
        allow_write,
        deny_write: Vec::new(),
        deny_read: config.deny_read_paths.iter().map(|p| path_string(p)).collect(),
        allow_git_config: Some(false),
        ..Default::default()
    };

    let network = NetworkConfig {
        allowed_domains: config.allowed_domains.clone(),
        ..Default::default()
    };

    SandboxRuntimeConfig {
        filesystem,
        network,
        ..Default::default()
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
