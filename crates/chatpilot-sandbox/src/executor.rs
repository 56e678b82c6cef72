//! Scratch-file execution with timeout and process-group reaping.

use std::io::Write;
use std::path::Path;
use std::process::{Output, Stdio};

use tokio::process::Command;
use tokio::time::timeout;

use crate::config::SandboxConfig;
use crate::error::{SandboxError, SandboxResult};
use crate::isolation::Isolation;
use crate::platform::Platform;

/// Result of one execution.
///
/// `success` is true iff the child exited with status zero. When the child
/// never ran to completion (spawn failure, timeout) `stdout` and `exit_code`
/// are `None` and `stderr` carries the error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: Option<i32>,
}

impl ExecutionOutcome {
    fn from_output(output: Output) -> Self {
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Self {
            success: output.status.success(),
            stdout: Some(stdout),
            stderr: Some(stderr),
            exit_code: output.status.code(),
        }
    }

    /// A failed outcome for an error that kept the code from running.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: None,
            stderr: Some(message.into()),
            exit_code: None,
        }
    }

    /// Standard output, or an empty string.
    pub fn output_text(&self) -> &str {
        self.stdout.as_deref().unwrap_or_default()
    }

    /// Best description of why the run failed.
    pub fn error_text(&self) -> String {
        match self.stderr.as_deref() {
            Some(err) if !err.is_empty() => err.to_string(),
            _ => match self.exit_code {
                Some(code) => format!("Process exited with code {code}"),
                None => "Process terminated by signal".to_string(),
            },
        }
    }
}

/// Runs code strings through an interpreter.
///
/// Cheap to share behind an `Arc`; concurrent executions use independent
/// scratch files and process groups.
pub struct SandboxExecutor {
    config: SandboxConfig,
    isolation: Option<Isolation>,
}

impl SandboxExecutor {
    /// Create an executor.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Unavailable`] or
    /// [`SandboxError::InitializationFailed`] when `config.isolate` is set
    /// and the isolation backend can't be brought up.
    pub async fn new(config: SandboxConfig) -> SandboxResult<Self> {
        let isolation = if config.isolate {
            Some(Isolation::new(&config).await?)
        } else {
            None
        };
        Ok(Self { config, isolation })
    }

    /// Executor configuration.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Platform of the active isolation backend, if any.
    pub fn isolation_platform(&self) -> Option<Platform> {
        self.isolation.as_ref().map(Isolation::platform)
    }

    /// Run `code` and report what happened. Never fails; errors become a
    /// failed outcome. The scratch file is gone when this returns or when the
    /// future is dropped.
    pub async fn execute(&self, code: &str) -> ExecutionOutcome {
        match self.try_execute(code).await {
            Ok(outcome) => {
                tracing::debug!(
                    success = outcome.success,
                    exit_code = ?outcome.exit_code,
                    "Sandbox execution finished"
                );
                outcome
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sandbox execution failed");
                ExecutionOutcome::error(e.to_string())
            }
        }
    }

    async fn try_execute(&self, code: &str) -> SandboxResult<ExecutionOutcome> {
        let scratch_dir = self.config.scratch_dir();
        let mut script = tempfile::Builder::new()
            .prefix("chatpilot-")
            .suffix(&self.config.file_suffix)
            .tempfile_in(&scratch_dir)?;
        script.write_all(code.as_bytes())?;
        script.flush()?;

        let mut cmd = self.command_for(script.path()).await?;
        cmd.current_dir(self.config.working_dir.as_deref().unwrap_or(scratch_dir.as_path()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.config.env_vars {
            cmd.env(key, value);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn()?;
        let mut group = ProcessGroup(child.id());

        let result = timeout(self.config.timeout, child.wait_with_output()).await;
        match result {
            Ok(Ok(output)) => {
                group.disarm();
                Ok(ExecutionOutcome::from_output(output))
            }
            Ok(Err(e)) => Err(SandboxError::ExecutionFailed(e.to_string())),
            Err(_) => {
                tracing::warn!(timeout = ?self.config.timeout, "Generated code timed out, killing process group");
                Err(SandboxError::Timeout(self.config.timeout))
            }
        }
        // `group` kills stragglers, then `script` removes the file.
    }

    async fn command_for(&self, script: &Path) -> SandboxResult<Command> {
        let mut argv = Vec::with_capacity(self.config.interpreter_args.len() + 2);
        argv.push(self.config.interpreter.clone());
        argv.extend(self.config.interpreter_args.iter().cloned());
        argv.push(script.to_string_lossy().to_string());

        match &self.isolation {
            Some(isolation) => {
                let wrapped = isolation.wrap(&argv).await?;
                let mut cmd = Command::new("/bin/sh");
                cmd.arg("-c").arg(wrapped);
                Ok(cmd)
            }
            None => {
                let mut cmd = Command::new(&argv[0]);
                cmd.args(&argv[1..]);
                Ok(cmd)
            }
        }
    }

    /// Tear down the isolation runtime, if one was started.
    pub async fn shutdown(&self) {
        if let Some(isolation) = &self.isolation {
            isolation.shutdown().await;
        }
    }
}

/// Kills the child's process group on drop unless disarmed.
///
/// Covers timeouts as well as the caller abandoning the future mid-wait;
/// `kill_on_drop` alone only reaches the direct child.
struct ProcessGroup(Option<u32>);

impl ProcessGroup {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.0.take().and_then(|pid| i32::try_from(pid).ok()) {
            // SAFETY: killpg has no memory-safety preconditions.
            unsafe {
                libc::killpg(pid, libc::SIGKILL);
            }
        }
    }
}
