//! LLM Client: the provider abstraction behind every generation call.
//!
//! ARCHITECTURAL RULE: No other module may call a generation backend directly.
//! The orchestrator picks the active provider from the `ProviderRegistry` and
//! drives it through the `GenerationProvider` trait.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod anthropic;
pub mod models;
pub mod ollama;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use models::{ModelDefaults, ModelTier};
pub use ollama::{OllamaConfig, OllamaProvider};
pub use registry::{ProviderKind, ProviderRegistry, ProviderStatus};

/// Output-format marker for structured (JSON object) requests.
pub const FORMAT_JSON: &str = "json";

pub const META_PROMPT_ID: &str = "prompt_id";
pub const META_PROMPT_VERSION: &str = "prompt_version";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Provider '{0}' is not configured")]
    NotConfigured(String),
}

impl LlmError {
    /// Maps a transport failure, folding reqwest timeouts into `Timeout`.
    pub(crate) fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(timeout)
        } else {
            LlmError::Http(err)
        }
    }
}

/// A single call against one model. Built by the orchestrator, never interpreted
/// beyond `prompt`/`model`/`format` by providers.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    /// Not used by the synchronous path.
    pub stream: bool,
    /// `Some("json")` for structured output, `None` for free text.
    pub format: Option<String>,
    /// Opaque key/value pairs for logging (prompt id/version).
    pub metadata: BTreeMap<String, String>,
}

impl GenerationRequest {
    pub fn expects_json(&self) -> bool {
        self.format.as_deref() == Some(FORMAT_JSON)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Cleaned output. For structured calls this is a JSON object.
    pub content: String,
    /// Provider text exactly as returned.
    pub raw: String,
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
    /// Reserved for a caller-side cache; the orchestrator never sets it.
    pub cached: bool,
    /// Token counts and backend timings, passed through untouched.
    pub provider_meta: BTreeMap<String, Value>,
    pub warnings: Vec<String>,
}

impl GenerationResult {
    /// A fresh, uncached result whose `content` and `raw` are both `text`.
    pub fn from_text(
        text: String,
        provider: impl Into<String>,
        model: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            content: text.clone(),
            raw: text,
            provider: provider.into(),
            model: model.into(),
            latency_ms,
            cached: false,
            provider_meta: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }
}

/// Per-call knobs forwarded to the provider untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderOptions {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Per-attempt timeout. Falls back to the provider's configured request timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ProviderOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// A text-generation backend.
///
/// `is_healthy` must be cheap: it reads a cached flag and never makes the
/// generation call itself. `probe` refreshes that flag and runs off the request path.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        options: &ProviderOptions,
    ) -> Result<GenerationResult, LlmError>;

    fn provider_name(&self) -> &str;

    fn is_healthy(&self) -> bool;

    async fn probe(&self) {}
}

/// Atomically updated health flag shared between the request path and the prober.
#[derive(Debug)]
pub struct HealthFlag(AtomicBool);

impl HealthFlag {
    pub fn new(healthy: bool) -> Self {
        Self(AtomicBool::new(healthy))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Stores the new value and returns the previous one.
    pub fn set(&self, healthy: bool) -> bool {
        self.0.swap(healthy, Ordering::AcqRel)
    }
}
