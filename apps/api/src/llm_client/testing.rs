//! In-memory provider for orchestrator, registry and route tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::llm_client::{
    GenerationProvider, GenerationRequest, GenerationResult, LlmError, ProviderOptions,
};

/// Model id every scripted response claims to come from, so tests can check
/// that the orchestrator overrides it with the candidate it actually tried.
pub(crate) const REPORTED_MODEL: &str = "backend-reported-model";

/// Timeout reported by `time_out` outcomes.
pub(crate) const SCRIPTED_TIMEOUT: Duration = Duration::from_millis(250);

enum Outcome {
    Text(String),
    Status(u16),
    TimedOut,
}

pub(crate) struct ScriptedProvider {
    name: String,
    healthy: bool,
    outcomes: HashMap<String, Outcome>,
    calls: Mutex<Vec<(GenerationRequest, ProviderOptions)>>,
}

impl ScriptedProvider {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            healthy: true,
            outcomes: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn healthy(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    /// `model` answers with `text`.
    pub(crate) fn respond(mut self, model: &str, text: &str) -> Self {
        self.outcomes.insert(model.to_string(), Outcome::Text(text.to_string()));
        self
    }

    /// `model` fails with an API error carrying `status`.
    pub(crate) fn fail(mut self, model: &str, status: u16) -> Self {
        self.outcomes.insert(model.to_string(), Outcome::Status(status));
        self
    }

    /// `model` exceeds its deadline.
    pub(crate) fn time_out(mut self, model: &str) -> Self {
        self.outcomes.insert(model.to_string(), Outcome::TimedOut);
        self
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    pub(crate) fn models_called(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.model).collect()
    }

    pub(crate) fn options_seen(&self) -> Vec<ProviderOptions> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, options)| options.clone())
            .collect()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
        options: &ProviderOptions,
    ) -> Result<GenerationResult, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), options.clone()));

        match self.outcomes.get(&request.model) {
            Some(Outcome::Text(text)) => {
                let mut result =
                    GenerationResult::from_text(text.clone(), self.name.as_str(), REPORTED_MODEL, 5);
                result
                    .provider_meta
                    .insert("output_tokens".to_string(), json!(text.len()));
                result.warnings.push("scripted".to_string());
                Ok(result)
            }
            Some(Outcome::Status(status)) => Err(LlmError::Api {
                status: *status,
                message: format!("scripted failure for {}", request.model),
            }),
            Some(Outcome::TimedOut) => Err(LlmError::Timeout(SCRIPTED_TIMEOUT)),
            None => Err(LlmError::Api {
                status: 404,
                message: format!("model '{}' not scripted", request.model),
            }),
        }
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}
