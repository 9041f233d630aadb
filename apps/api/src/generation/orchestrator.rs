//! Generation Orchestrator: turns a prompt id plus variables into one successful
//! generation, falling back across candidate models.
//!
//! Flow: resolve template → render once → pick active provider → resolve candidate
//! models → for each candidate: call → (structured) validate → one repair pass.
//!
//! Each candidate is tried at most once and strictly in sequence. A failed attempt
//! is logged and the loop moves to the next model; only the last failure is
//! returned if every candidate fails. The orchestrator holds no per-call state and
//! imposes no deadline of its own: timeouts travel down to the provider through
//! `ProviderOptions`, and dropping the returned future cancels the in-flight call.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::generation::repair::{is_json_object, JsonRepair};
use crate::llm_client::{
    GenerationProvider, GenerationRequest, GenerationResult, LlmError, ModelDefaults,
    ProviderOptions, ProviderRegistry, FORMAT_JSON, META_PROMPT_ID, META_PROMPT_VERSION,
};
use crate::prompts::{PromptError, PromptRegistry, PromptTemplate, Variables};

/// Appended to `warnings` when the returned content came out of the repair pass.
pub const REPAIRED_WARNING: &str = "structured output repaired";

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Errors that cross the orchestrator boundary.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Unknown prompt id. A configuration error, not a user input error.
    #[error("Configuration error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Configuration error: no candidate models configured")]
    NoCandidateModels,

    #[error("No healthy generation provider available")]
    NoHealthyProvider,

    #[error("All {attempts} candidate model(s) failed; last model '{model}': {source}")]
    Exhausted {
        model: String,
        attempts: usize,
        #[source]
        source: AttemptError,
    },
}

impl GenerationError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GenerationError::Prompt(_) | GenerationError::NoCandidateModels
        )
    }
}

/// Why a single candidate model failed. Never crosses the boundary on its own.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("provider call failed: {0}")]
    Provider(#[from] LlmError),

    #[error("structured output is not a JSON object, even after one repair pass")]
    InvalidStructuredOutput,
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

pub struct Orchestrator {
    prompts: Arc<PromptRegistry>,
    providers: Arc<ProviderRegistry>,
    models: ModelDefaults,
    repair: Arc<dyn JsonRepair>,
}

impl Orchestrator {
    pub fn new(
        prompts: Arc<PromptRegistry>,
        providers: Arc<ProviderRegistry>,
        models: ModelDefaults,
        repair: Arc<dyn JsonRepair>,
    ) -> Self {
        Self {
            prompts,
            providers,
            models,
            repair,
        }
    }

    pub fn prompts(&self) -> &PromptRegistry {
        &self.prompts
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn models(&self) -> &ModelDefaults {
        &self.models
    }

    /// Runs `prompt_id` against the candidate chain seeded by `model_preference`.
    ///
    /// With `expect_structured`, the returned `content` is guaranteed to be a JSON
    /// object; `raw` keeps the provider's original text.
    pub async fn generate(
        &self,
        prompt_id: &str,
        variables: &Variables,
        model_preference: Option<&str>,
        options: &ProviderOptions,
        expect_structured: bool,
    ) -> Result<GenerationResult, GenerationError> {
        let template = self.prompts.get(prompt_id)?;
        let prompt = template.render(variables);

        let provider = self
            .providers
            .active()
            .ok_or(GenerationError::NoHealthyProvider)?;

        let candidates = self.models.ordered(model_preference);
        if candidates.is_empty() {
            return Err(GenerationError::NoCandidateModels);
        }

        let mut last_failure: Option<(String, AttemptError)> = None;

        for (index, model) in candidates.iter().enumerate() {
            let request = build_request(template, &prompt, model, expect_structured);

            match self
                .attempt(provider.as_ref(), &request, options, expect_structured)
                .await
            {
                Ok(mut result) => {
                    result.model = model.clone();
                    result.cached = false;
                    info!(
                        "Generated '{}' v{} with {}/{} in {}ms (attempt {}/{})",
                        template.id,
                        template.version,
                        result.provider,
                        model,
                        result.latency_ms,
                        index + 1,
                        candidates.len()
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        "Generation attempt {}/{} for '{}' failed on model {}: {}",
                        index + 1,
                        candidates.len(),
                        template.id,
                        model,
                        e
                    );
                    last_failure = Some((model.clone(), e));
                }
            }
        }

        let (model, source) = last_failure.ok_or(GenerationError::NoCandidateModels)?;
        Err(GenerationError::Exhausted {
            model,
            attempts: candidates.len(),
            source,
        })
    }

    /// One candidate: a single provider call plus, in structured mode, at most one
    /// repair pass.
    async fn attempt(
        &self,
        provider: &dyn GenerationProvider,
        request: &GenerationRequest,
        options: &ProviderOptions,
        expect_structured: bool,
    ) -> Result<GenerationResult, AttemptError> {
        let mut result = provider.generate(request, options).await?;

        if !expect_structured || is_json_object(&result.content) {
            return Ok(result);
        }

        match self.repair.try_repair(&result.content) {
            Some(repaired) if is_json_object(&repaired) => {
                result.content = repaired;
                result.warnings.push(REPAIRED_WARNING.to_string());
                Ok(result)
            }
            _ => Err(AttemptError::InvalidStructuredOutput),
        }
    }
}

fn build_request(
    template: &PromptTemplate,
    prompt: &str,
    model: &str,
    expect_structured: bool,
) -> GenerationRequest {
    GenerationRequest {
        prompt: prompt.to_string(),
        model: model.to_string(),
        stream: false,
        format: expect_structured.then(|| FORMAT_JSON.to_string()),
        metadata: BTreeMap::from([
            (META_PROMPT_ID.to_string(), template.id.clone()),
            (META_PROMPT_VERSION.to_string(), template.version.clone()),
        ]),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
