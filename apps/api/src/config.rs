use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::llm_client::{anthropic, ollama, ModelDefaults, ProviderKind};

const DEFAULT_PROVIDERS: &str = "anthropic,ollama";

/// Application configuration loaded from environment variables.
/// Fails at startup if no default model is configured or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub models: ModelDefaults,
    /// Provider registration order; the first healthy one serves each call.
    pub providers: Vec<ProviderKind>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub ollama_base_url: String,
    pub request_timeout_secs: u64,
    pub max_tokens: u32,
    pub health_probe_interval_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let models = ModelDefaults {
            primary: optional("LLM_MODEL_PRIMARY"),
            secondary: optional("LLM_MODEL_SECONDARY"),
            fallback: optional("LLM_MODEL_FALLBACK"),
            tiny: optional("LLM_MODEL_TINY"),
        };
        models.validate()?;

        let providers = parse_providers(
            &optional("LLM_PROVIDERS").unwrap_or_else(|| DEFAULT_PROVIDERS.to_string()),
        )?;

        Ok(Config {
            models,
            providers,
            anthropic_api_key: optional("ANTHROPIC_API_KEY"),
            anthropic_base_url: optional("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| anthropic::DEFAULT_BASE_URL.to_string()),
            ollama_base_url: optional("OLLAMA_BASE_URL")
                .unwrap_or_else(|| ollama::DEFAULT_BASE_URL.to_string()),
            request_timeout_secs: parse_or(&optional, "LLM_REQUEST_TIMEOUT_SECS", 120)?,
            max_tokens: parse_or(&optional, "LLM_MAX_TOKENS", 4096)?,
            health_probe_interval_secs: parse_or(&optional, "HEALTH_PROBE_INTERVAL_SECS", 30)?,
            port: parse_or(&optional, "PORT", 8080)?,
            rust_log: optional("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_probe_interval(&self) -> Duration {
        Duration::from_secs(self.health_probe_interval_secs.max(1))
    }
}

fn parse_providers(raw: &str) -> Result<Vec<ProviderKind>> {
    let mut providers = Vec::new();
    for name in raw.split(',').filter(|n| !n.trim().is_empty()) {
        let kind: ProviderKind = name
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("LLM_PROVIDERS contains an unknown provider")?;
        if !providers.contains(&kind) {
            providers.push(kind);
        }
    }
    if providers.is_empty() {
        return Err(anyhow!("LLM_PROVIDERS must name at least one provider"));
    }
    Ok(providers)
}

fn parse_or<T>(optional: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
