//! LLM-backed code generation.

use async_trait::async_trait;
use chatpilot_llm::{CompletionRequest, Message, SamplingParams, SharedBackend};
use tracing::debug;

use crate::error::Result;

/// Instructions for the code-writing model. `{metadata}` is replaced with the
/// uploaded file summary.
pub const CODE_GENERATOR_PROMPT: &str = r#"You are a Python code generator that creates data analysis and machine learning code.

Below is the file metadata, including file names, columns with dtypes and sample rows:

{metadata}

RULES (FOLLOW EXACTLY)

1. Column Name Normalization
- Convert all column names and all user-requested variables to lowercase.

2. Allowed Libraries
- USE ONLY: pandas, numpy, scikit-learn, statsmodels, matplotlib, seaborn.
- STRICTLY FORBIDDEN: tensorflow, keras, pytorch, torch. Do not use deep learning.

3. Output Format
- Always end with print() to show results.
- Return ONLY executable Python code.

MACHINE LEARNING WORKFLOW

When the task requires training a model, ALWAYS follow this sequence:

STEP 1: Exploratory Data Analysis
- Load data and check shape, dtypes and missing values.
- Print summary statistics (df.describe()) and, for classification, the class distribution.
- Print the correlation matrix of numerical features.

STEP 2: Preprocessing Pipeline
- Use scikit-learn Pipeline and ColumnTransformer.
- Numerical features: SimpleImputer + StandardScaler.
- Categorical features: SimpleImputer + OneHotEncoder.
- Combine preprocessing and model into ONE pipeline.

STEP 3: Train-Test Split
- Use train_test_split(test_size=0.2, random_state=42) and print both shapes.

STEP 4: Model Training
- Fit the complete pipeline on the training data. Never fit preprocessing separately.

STEP 5: Evaluation
- Classification: accuracy, classification_report, confusion_matrix.
- Regression: MAE, RMSE, R2.

STEP 6: Save Pipeline
- Save the COMPLETE pipeline with joblib.dump() and print the file name.

TASK

Generate clean, correct, production-ready Python code for the user's request."#;

/// Produces candidate analysis code.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Write code for `task`.
    ///
    /// `previous` carries the last attempt's code and error when retrying.
    /// An empty string means the model produced nothing.
    async fn generate(
        &self,
        task: &str,
        metadata_summary: &str,
        previous: Option<(&str, &str)>,
    ) -> Result<String>;
}

/// [`CodeGenerator`] making one non-streaming model call per attempt.
pub struct LlmCodeGenerator {
    backend: SharedBackend,
    model: String,
    sampling: SamplingParams,
}

impl LlmCodeGenerator {
    pub fn new(backend: SharedBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            sampling: SamplingParams::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    /// The request sent for one attempt.
    pub fn build_request(
        &self,
        task: &str,
        metadata_summary: &str,
        previous: Option<(&str, &str)>,
    ) -> CompletionRequest {
        let mut messages = vec![Message::user(task)];
        if let Some((code, error)) = previous {
            messages.push(Message::assistant(code));
            messages.push(Message::user(format!("ERROR:\n{error}\n\nFix the code.")));
        }

        CompletionRequest::new(&self.model, messages)
            .with_system(CODE_GENERATOR_PROMPT.replace("{metadata}", metadata_summary))
            .with_sampling(self.sampling)
    }
}

#[async_trait]
impl CodeGenerator for LlmCodeGenerator {
    async fn generate(
        &self,
        task: &str,
        metadata_summary: &str,
        previous: Option<(&str, &str)>,
    ) -> Result<String> {
        let request = self.build_request(task, metadata_summary, previous);
        let code = self.backend.complete(request).await?;
        debug!(chars = code.len(), "Generated analysis code");
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatpilot_llm::{MockBackend, Role};
    use std::sync::Arc;

    #[test]
    fn test_first_attempt_request() {
        let generator = LlmCodeGenerator::new(Arc::new(MockBackend::new()), "gpt-4o-mini");
        let request = generator.build_request("average price", "sales.csv: price", None);

        assert_eq!(request.model, "gpt-4o-mini");
        assert!(!request.tools);
        assert_eq!(request.messages, vec![Message::user("average price")]);
        let system = request.system.unwrap();
        assert!(system.contains("sales.csv: price"));
        assert!(!system.contains("{metadata}"));
        assert!(system.contains("STRICTLY FORBIDDEN"));
    }

    #[test]
    fn test_retry_request_appends_previous_attempt() {
        let generator = LlmCodeGenerator::new(Arc::new(MockBackend::new()), "m");
        let request = generator.build_request("t", "", Some(("print(x)", "NameError: x")));

        let roles: Vec<Role> = request.messages.iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(request.messages[1].content(), "print(x)");
        assert_eq!(
            request.messages[2].content(),
            "ERROR:\nNameError: x\n\nFix the code."
        );
    }

    #[tokio::test]
    async fn test_generate_returns_raw_reply() {
        let backend = Arc::new(MockBackend::new().with_completion("```python\nprint(1)\n```"));
        let generator = LlmCodeGenerator::new(backend.clone(), "m");

        let code = generator.generate("t", "", None).await.unwrap();
        assert_eq!(code, "```python\nprint(1)\n```");
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_generate_propagates_backend_error() {
        let backend = Arc::new(MockBackend::new().with_failed_completion("down"));
        let generator = LlmCodeGenerator::new(backend, "m");
        assert!(generator.generate("t", "", None).await.is_err());
    }
}
