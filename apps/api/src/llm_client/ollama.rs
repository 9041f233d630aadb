//! Ollama provider: local model runtime over its `/api/generate` endpoint.
//!
//! Health is a cached flag refreshed by `probe()` against `/api/tags`; the request
//! path only ever reads the flag.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::llm_client::{
    GenerationProvider, GenerationRequest, GenerationResult, HealthFlag, LlmError,
    ProviderOptions,
};

pub const PROVIDER_NAME: &str = "ollama";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaModelOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    model: Option<String>,
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    /// Nanoseconds.
    #[serde(default)]
    total_duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}

pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
    healthy: HealthFlag,
}

impl OllamaProvider {
    /// Starts unhealthy; the first `probe()` decides.
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            config,
            healthy: HealthFlag::new(false),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl GenerationProvider for OllamaProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
        options: &ProviderOptions,
    ) -> Result<GenerationResult, LlmError> {
        let model_options = (options.temperature.is_some() || options.max_tokens.is_some())
            .then(|| OllamaModelOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            });

        let body = OllamaGenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            // The synchronous path always reads a single response object.
            stream: false,
            format: request.format.as_deref(),
            system: options.system.as_deref(),
            options: model_options,
        };

        let timeout = options.timeout().unwrap_or(self.config.request_timeout);
        let started = Instant::now();

        let response = self
            .client
            .post(self.url("/api/generate"))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::from_transport(e, timeout))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OllamaError>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: OllamaGenerateResponse = serde_json::from_str(&text)?;
        if parsed.response.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        let latency_ms = started.elapsed().as_millis() as u64;

        debug!(
            "Ollama call succeeded: model={}, eval_count={:?}, latency={}ms",
            request.model, parsed.eval_count, latency_ms
        );

        let mut provider_meta = BTreeMap::new();
        if let Some(count) = parsed.prompt_eval_count {
            provider_meta.insert("prompt_eval_count".to_string(), json!(count));
        }
        if let Some(count) = parsed.eval_count {
            provider_meta.insert("eval_count".to_string(), json!(count));
        }
        if let Some(nanos) = parsed.total_duration {
            provider_meta.insert("total_duration".to_string(), json!(nanos));
        }

        let mut result = GenerationResult::from_text(
            parsed.response,
            PROVIDER_NAME,
            parsed.model.unwrap_or_else(|| request.model.clone()),
            latency_ms,
        );
        result.provider_meta = provider_meta;
        Ok(result)
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_healthy(&self) -> bool {
        self.healthy.get()
    }

    async fn probe(&self) {
        let reachable = match self
            .client
            .get(self.url("/api/tags"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Ollama probe failed: {e}");
                false
            }
        };

        let was_healthy = self.healthy.set(reachable);
        if reachable && !was_healthy {
            info!("Ollama at {} is reachable", self.config.base_url);
        } else if !reachable && was_healthy {
            warn!("Ollama at {} became unreachable", self.config.base_url);
        }
    }
}
