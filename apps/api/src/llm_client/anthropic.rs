//! Anthropic Messages API provider.
//!
//! One HTTP round trip per call. Retrying is the orchestrator's job, and it
//! retries on a different model, so this provider never retries on its own.
//!
//! Health is lost only on a 401 and comes back through `probe()`. A 403 rejects
//! one model, not the key.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::llm_client::{
    GenerationProvider, GenerationRequest, GenerationResult, HealthFlag, LlmError,
    ProviderOptions,
};
use crate::prompts::library::JSON_ONLY_SYSTEM;

pub const PROVIDER_NAME: &str = "anthropic";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MESSAGES_PATH: &str = "/v1/messages";
const MODELS_PATH: &str = "/v1/models";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    model: Option<String>,
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicResponse {
    /// Extracts the text content from the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
    /// Cleared when the API rejects our credentials.
    credentials_ok: HealthFlag,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            config,
            credentials_ok: HealthFlag::new(true),
        })
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl GenerationProvider for AnthropicProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
        options: &ProviderOptions,
    ) -> Result<GenerationResult, LlmError> {
        let api_key = self
            .api_key()
            .ok_or_else(|| LlmError::NotConfigured(PROVIDER_NAME.to_string()))?;

        let system = options
            .system
            .as_deref()
            .or_else(|| request.expects_json().then_some(JSON_ONLY_SYSTEM));

        let body = AnthropicRequest {
            model: &request.model,
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            system,
            temperature: options.temperature,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let timeout = options.timeout().unwrap_or(self.config.request_timeout);
        let started = Instant::now();

        let response = self
            .client
            .post(self.url(MESSAGES_PATH))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
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
            let message = serde_json::from_str::<AnthropicError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);

            // 403 is per model (permission_error); only 401 says the key itself is bad.
            if status == StatusCode::UNAUTHORIZED && self.credentials_ok.set(false) {
                warn!("Anthropic rejected credentials ({status}); marking provider unhealthy");
            }

            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: AnthropicResponse = serde_json::from_str(&text)?;
        let content = parsed
            .text()
            .filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyContent)?
            .to_string();
        let latency_ms = started.elapsed().as_millis() as u64;

        debug!(
            "Anthropic call succeeded: model={}, input_tokens={}, output_tokens={}, latency={}ms",
            request.model, parsed.usage.input_tokens, parsed.usage.output_tokens, latency_ms
        );

        let mut result = GenerationResult::from_text(
            content,
            PROVIDER_NAME,
            parsed.model.clone().unwrap_or_else(|| request.model.clone()),
            latency_ms,
        );
        result.provider_meta = BTreeMap::from([
            ("input_tokens".to_string(), json!(parsed.usage.input_tokens)),
            ("output_tokens".to_string(), json!(parsed.usage.output_tokens)),
        ]);
        if let Some(stop_reason) = parsed.stop_reason {
            if stop_reason == "max_tokens" {
                result
                    .warnings
                    .push("output truncated at max_tokens".to_string());
            }
            result
                .provider_meta
                .insert("stop_reason".to_string(), json!(stop_reason));
        }

        Ok(result)
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_healthy(&self) -> bool {
        self.api_key().is_some() && self.credentials_ok.get()
    }

    /// Re-checks the key against the model listing. Only a 2xx or a 401 changes
    /// the flag; outages and throttling say nothing about the credentials.
    async fn probe(&self) {
        let Some(api_key) = self.api_key() else {
            return;
        };

        let status = match self
            .client
            .get(self.url(MODELS_PATH))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status(),
            Err(e) => {
                debug!("Anthropic probe failed: {e}");
                return;
            }
        };

        if status.is_success() {
            if !self.credentials_ok.set(true) {
                info!("Anthropic accepted credentials again; provider is healthy");
            }
        } else if status == StatusCode::UNAUTHORIZED {
            if self.credentials_ok.set(false) {
                warn!("Anthropic rejected credentials on probe; marking provider unhealthy");
            }
        } else {
            debug!("Anthropic probe returned {status}; health unchanged");
        }
    }
}
