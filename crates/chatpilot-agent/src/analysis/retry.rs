//! The bounded generate-execute-repair loop.

use std::sync::Arc;

use async_trait::async_trait;
use chatpilot_sandbox::{ExecutionOutcome, SandboxExecutor};
use tracing::{info, warn};

use super::fence::strip_code_fence;
use super::generator::CodeGenerator;
use crate::error::Result;
use crate::types::{FileMetadataMap, metadata_summary};

/// Default number of attempts per analysis.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Runs a code string and reports how it went.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, code: &str) -> Result<ExecutionOutcome>;
}

#[async_trait]
impl CodeExecutor for SandboxExecutor {
    async fn execute(&self, code: &str) -> Result<ExecutionOutcome> {
        Ok(SandboxExecutor::execute(self, code).await)
    }
}

/// One pass through the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisAttempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Code that was run, after fence stripping. Empty if generation failed.
    pub code: String,
    /// `Ok(stdout)` on success, otherwise the error text.
    pub outcome: std::result::Result<String, String>,
}

/// Final result of an analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub success: bool,
    /// Standard output of the successful run.
    pub result: Option<String>,
    /// Why the analysis failed.
    pub error: Option<String>,
    /// Code of the last attempt that got as far as execution.
    pub final_code: Option<String>,
    pub attempts_used: u32,
    pub attempts: Vec<AnalysisAttempt>,
}

impl AnalysisOutcome {
    /// Text of the tool message reporting this outcome.
    pub fn tool_content(&self) -> String {
        if self.success {
            match self.result.as_deref() {
                Some(out) if !out.is_empty() => format!("Analysis result: {out}"),
                _ => "Task completed successfully with no output.".to_string(),
            }
        } else {
            format!("Analysis failed: {}", self.error.as_deref().unwrap_or_default())
        }
    }
}

/// Composes a generator and an executor into a bounded retry cycle.
///
/// Every failure inside an attempt, generation or execution, is recorded as
/// that attempt's error; only running out of attempts ends the loop with a
/// failure.
pub struct AnalysisLoop {
    generator: Arc<dyn CodeGenerator>,
    executor: Arc<dyn CodeExecutor>,
    max_attempts: u32,
}

impl AnalysisLoop {
    pub fn new(generator: Arc<dyn CodeGenerator>, executor: Arc<dyn CodeExecutor>) -> Self {
        Self {
            generator,
            executor,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the attempt bound (at least one attempt always runs).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run(&self, task: &str, metadata: Option<&FileMetadataMap>) -> AnalysisOutcome {
        let summary = metadata_summary(metadata);
        let mut previous_code: Option<String> = None;
        let mut previous_error: Option<String> = None;
        let mut attempts = Vec::new();

        for number in 1..=self.max_attempts {
            info!(attempt = number, max_attempts = self.max_attempts, "Code generation attempt");

            let previous = previous_code.as_deref().zip(previous_error.as_deref());
            let code = match self.generator.generate(task, &summary, previous).await {
                Ok(raw) => strip_code_fence(&raw),
                Err(e) => {
                    warn!(attempt = number, error = %e, "Code generation failed");
                    previous_error = Some(e.to_string());
                    attempts.push(AnalysisAttempt {
                        number,
                        code: String::new(),
                        outcome: Err(e.to_string()),
                    });
                    continue;
                }
            };

            let error = match self.executor.execute(&code).await {
                Ok(outcome) if outcome.success => {
                    info!(attempt = number, "Analysis succeeded");
                    let stdout = outcome.output_text().to_string();
                    attempts.push(AnalysisAttempt {
                        number,
                        code: code.clone(),
                        outcome: Ok(stdout.clone()),
                    });
                    return AnalysisOutcome {
                        success: true,
                        result: Some(stdout),
                        error: None,
                        final_code: Some(code),
                        attempts_used: number,
                        attempts,
                    };
                }
                Ok(outcome) => outcome.error_text(),
                Err(e) => e.to_string(),
            };

            warn!(attempt = number, error = %error, "Analysis attempt failed");
            attempts.push(AnalysisAttempt {
                number,
                code: code.clone(),
                outcome: Err(error.clone()),
            });
            previous_code = Some(code);
            previous_error = Some(error);
        }

        warn!(max_attempts = self.max_attempts, "All analysis attempts failed");
        AnalysisOutcome {
            success: false,
            result: None,
            error: Some(format!(
                "Failed after {} attempts. Last error: {}",
                self.max_attempts,
                previous_error.unwrap_or_default()
            )),
            final_code: previous_code,
            attempts_used: self.max_attempts,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Previous = Option<(String, String)>;

    /// Replies from a script and records what it was asked.
    struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<Previous>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Previous> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CodeGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            _task: &str,
            _summary: &str,
            previous: Option<(&str, &str)>,
        ) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(previous.map(|(c, e)| (c.to_string(), e.to_string())));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("print('fallback')".into()))
        }
    }

    /// Succeeds for code containing "ok", fails otherwise.
    #[derive(Default)]
    struct KeywordExecutor {
        runs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CodeExecutor for KeywordExecutor {
        async fn execute(&self, code: &str) -> Result<ExecutionOutcome> {
            self.runs.lock().unwrap().push(code.to_string());
            if code.contains("raise") {
                return Err(AgentError::analysis("executor crashed"));
            }
            Ok(if code.contains("ok") {
                ExecutionOutcome {
                    success: true,
                    stdout: Some("42".into()),
                    stderr: Some(String::new()),
                    exit_code: Some(0),
                }
            } else {
                ExecutionOutcome {
                    success: false,
                    stdout: Some(String::new()),
                    stderr: Some("ZeroDivisionError".into()),
                    exit_code: Some(1),
                }
            })
        }
    }

    fn analysis_loop(
        generator: Arc<ScriptedGenerator>,
        executor: Arc<KeywordExecutor>,
        max: u32,
    ) -> AnalysisLoop {
        AnalysisLoop::new(generator, executor).with_max_attempts(max)
    }

    #[tokio::test]
    async fn test_success_on_kth_attempt_stops() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("1/0".into()),
            Ok("```python\nprint('ok')\n```".into()),
        ]));
        let executor = Arc::new(KeywordExecutor::default());
        let outcome = analysis_loop(generator.clone(), executor.clone(), 3)
            .run("task", None)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts_used, 2);
        assert_eq!(outcome.result.as_deref(), Some("42"));
        assert_eq!(outcome.final_code.as_deref(), Some("print('ok')"));
        assert_eq!(outcome.tool_content(), "Analysis result: 42");
        assert_eq!(generator.calls().len(), 2);
        assert_eq!(executor.runs.lock().unwrap().len(), 2);

        // The retry sees the failed code and its error.
        assert_eq!(generator.calls()[0], None);
        assert_eq!(
            generator.calls()[1],
            Some(("1/0".to_string(), "ZeroDivisionError".to_string()))
        );
    }

    #[tokio::test]
    async fn test_always_failing_uses_all_attempts() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("a".into()),
            Ok("b".into()),
            Ok("c".into()),
            Ok("d".into()),
        ]));
        let executor = Arc::new(KeywordExecutor::default());
        let outcome = analysis_loop(generator.clone(), executor.clone(), 3)
            .run("task", None)
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts_used, 3);
        assert_eq!(outcome.attempts.len(), 3);
        assert_eq!(executor.runs.lock().unwrap().len(), 3);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Failed after 3 attempts. Last error: ZeroDivisionError")
        );
        assert_eq!(
            outcome.tool_content(),
            "Analysis failed: Failed after 3 attempts. Last error: ZeroDivisionError"
        );
    }

    #[tokio::test]
    async fn test_generation_error_is_attempt_local() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(AgentError::analysis("model unavailable")),
            Ok("print('ok')".into()),
        ]));
        let executor = Arc::new(KeywordExecutor::default());
        let outcome = analysis_loop(generator.clone(), executor.clone(), 3)
            .run("task", None)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts_used, 2);
        assert_eq!(executor.runs.lock().unwrap().len(), 1);
        assert!(outcome.attempts[0].outcome.is_err());
        // No code yet, so no repair turn on the retry.
        assert_eq!(generator.calls()[1], None);
    }

    #[tokio::test]
    async fn test_executor_error_is_retried() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("raise".into()),
            Ok("ok".into()),
        ]));
        let executor = Arc::new(KeywordExecutor::default());
        let outcome = analysis_loop(generator, executor, 2).run("task", None).await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts_used, 2);
        assert!(
            outcome.attempts[0]
                .outcome
                .as_ref()
                .unwrap_err()
                .contains("executor crashed")
        );
    }

    #[test]
    fn test_tool_content_without_output() {
        let outcome = AnalysisOutcome {
            success: true,
            result: Some(String::new()),
            error: None,
            final_code: None,
            attempts_used: 1,
            attempts: Vec::new(),
        };
        assert_eq!(
            outcome.tool_content(),
            "Task completed successfully with no output."
        );
    }

    #[test]
    fn test_at_least_one_attempt() {
        let generator = Arc::new(ScriptedGenerator::new(Vec::new()));
        let executor = Arc::new(KeywordExecutor::default());
        assert_eq!(analysis_loop(generator, executor, 0).max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_sandbox_executor_as_code_executor() {
        let sandbox = chatpilot_sandbox::SandboxExecutor::new(
            chatpilot_sandbox::SandboxConfig::default().with_interpreter("sh", ".sh"),
        )
        .await
        .unwrap();
        let executor: Arc<dyn CodeExecutor> = Arc::new(sandbox);
        let outcome = executor.execute("echo 42").await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output_text(), "42");
    }
}
