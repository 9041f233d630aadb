//! Provider registry: providers in fixed registration order; the first healthy
//! one serves the call.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Config;
use crate::llm_client::{
    anthropic, ollama, AnthropicConfig, AnthropicProvider, GenerationProvider, LlmError,
    OllamaConfig, OllamaProvider,
};

/// Backends that can be named in `LLM_PROVIDERS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    Ollama,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            anthropic::PROVIDER_NAME => Ok(ProviderKind::Anthropic),
            ollama::PROVIDER_NAME => Ok(ProviderKind::Ollama),
            other => Err(format!(
                "unknown provider '{other}' (expected 'anthropic' or 'ollama')"
            )),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Anthropic => f.write_str(anthropic::PROVIDER_NAME),
            ProviderKind::Ollama => f.write_str(ollama::PROVIDER_NAME),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub healthy: bool,
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn GenerationProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds providers in the order listed by `LLM_PROVIDERS`.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let mut registry = Self::new();
        for kind in &config.providers {
            let provider: Arc<dyn GenerationProvider> = match kind {
                ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(AnthropicConfig {
                    api_key: config.anthropic_api_key.clone(),
                    base_url: config.anthropic_base_url.clone(),
                    max_tokens: config.max_tokens,
                    request_timeout: config.request_timeout(),
                })?),
                ProviderKind::Ollama => Arc::new(OllamaProvider::new(OllamaConfig {
                    base_url: config.ollama_base_url.clone(),
                    request_timeout: config.request_timeout(),
                })?),
            };
            registry.register(provider);
        }
        Ok(registry)
    }

    /// Appends `provider` at the lowest priority.
    pub fn register(&mut self, provider: Arc<dyn GenerationProvider>) -> &mut Self {
        info!("Registered generation provider '{}'", provider.provider_name());
        self.providers.push(provider);
        self
    }

    /// First registered provider reporting healthy.
    pub fn active(&self) -> Option<Arc<dyn GenerationProvider>> {
        self.providers.iter().find(|p| p.is_healthy()).cloned()
    }

    pub fn health_report(&self) -> Vec<ProviderStatus> {
        self.providers
            .iter()
            .map(|p| ProviderStatus {
                name: p.provider_name().to_string(),
                healthy: p.is_healthy(),
            })
            .collect()
    }

    /// Refreshes every provider's cached health concurrently.
    pub async fn probe_all(&self) {
        join_all(self.providers.iter().map(|p| p.probe())).await;
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Re-probes all providers every `every`, off the request path.
pub fn spawn_health_probe(registry: Arc<ProviderRegistry>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately; startup already probed once.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            registry.probe_all().await;
            debug!("Provider health refreshed: {:?}", registry.health_report());
        }
    })
}
