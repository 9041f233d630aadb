//! Axum route handlers for the Generation API.
//!
//! Thin caller of the orchestrator: authorization, usage accounting and caching
//! live in front of this service, keyed by the returned `cache_key`.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::fingerprint::hash_parts;
use crate::llm_client::{GenerationResult, ProviderOptions};
use crate::prompts::{PromptTemplate, Variables};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt_id: String,
    #[serde(default)]
    pub variables: Variables,
    /// Tier name (`primary`, `secondary`, `fallback`, `tiny`) or a raw model id.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub expect_json: bool,
    #[serde(default)]
    pub options: ProviderOptions,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    #[serde(flatten)]
    pub result: GenerationResult,
    pub cache_key: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/generate
///
/// Renders `prompt_id` with `variables` and runs it through the model fallback chain.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    if request.prompt_id.trim().is_empty() {
        return Err(AppError::Validation("prompt_id cannot be empty".to_string()));
    }

    let result = state
        .orchestrator
        .generate(
            &request.prompt_id,
            &request.variables,
            request.model.as_deref(),
            &request.options,
            request.expect_json,
        )
        .await?;

    let template = state
        .orchestrator
        .prompts()
        .get(&request.prompt_id)
        .map_err(|e| AppError::Internal(e.into()))?;
    let cache_key = cache_key(template, &request)?;

    Ok(Json(GenerateResponse { result, cache_key }))
}

/// GET /api/v1/prompts
///
/// Lists registered prompt templates (id, display name, version).
pub async fn handle_list_prompts(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "prompts": state.orchestrator.prompts().list() }))
}

/// Fingerprint of everything that determines the generated output.
/// `timeout_ms` is left out: it bounds the call but never shapes the text.
fn cache_key(template: &PromptTemplate, request: &GenerateRequest) -> Result<String, AppError> {
    let variables = serde_json::to_string(&request.variables)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize variables: {e}")))?;
    let options = serde_json::to_string(&serde_json::json!({
        "system": request.options.system,
        "temperature": request.options.temperature,
        "max_tokens": request.options.max_tokens,
    }))
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize options: {e}")))?;

    Ok(hash_parts(&[
        template.id.as_str(),
        template.version.as_str(),
        variables.as_str(),
        request.model.as_deref().unwrap_or(""),
        if request.expect_json { "json" } else { "text" },
        options.as_str(),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::generation::{HeuristicRepair, Orchestrator};
    use crate::llm_client::testing::ScriptedProvider;
    use crate::llm_client::{ModelDefaults, ProviderRegistry};
    use crate::prompts::library::BULLET_REWRITE;
    use crate::prompts::PromptRegistry;
    use crate::routes::build_router;

    fn app(provider: ScriptedProvider) -> axum::Router {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(provider));
        let orchestrator = Orchestrator::new(
            PromptRegistry::builtin(),
            Arc::new(registry),
            ModelDefaults {
                primary: Some("A".to_string()),
                secondary: Some("B".to_string()),
                ..Default::default()
            },
            Arc::new(HeuristicRepair),
        );
        build_router(AppState {
            orchestrator: Arc::new(orchestrator),
        })
    }

    async fn post_generate(app: axum::Router, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/generate")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn rewrite_body() -> Value {
        json!({
            "prompt_id": BULLET_REWRITE,
            "variables": {"bullet": "Did caching", "role": "SRE", "tone": "ProductOriented"},
            "expect_json": true
        })
    }

    #[tokio::test]
    async fn test_generate_returns_result_and_cache_key() {
        let provider = ScriptedProvider::new("scripted")
            .fail("A", 500)
            .respond("B", "```json\n{\"text\": \"Built caching\"}\n```");
        let (status, body) = post_generate(app(provider), rewrite_body()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "B");
        assert_eq!(body["content"], "{\"text\": \"Built caching\"}");
        assert_eq!(body["cached"], false);
        assert_eq!(body["cache_key"].as_str().unwrap().len(), 43);
    }

    #[tokio::test]
    async fn test_cache_key_stable_for_identical_requests() {
        let make = || ScriptedProvider::new("scripted").respond("A", "{\"text\": \"x\"}");
        let (_, first) = post_generate(app(make()), rewrite_body()).await;
        let (_, second) = post_generate(app(make()), rewrite_body()).await;
        assert_eq!(first["cache_key"], second["cache_key"]);

        let mut other = rewrite_body();
        other["model"] = json!("tiny");
        let (_, third) = post_generate(app(make()), other).await;
        assert_ne!(first["cache_key"], third["cache_key"]);
    }

    #[tokio::test]
    async fn test_cache_key_changes_with_generation_options() {
        let make = || ScriptedProvider::new("scripted").respond("A", "{\"text\": \"x\"}");

        let mut french = rewrite_body();
        french["options"] = json!({"system": "Write in French", "temperature": 1.0});
        let mut english = rewrite_body();
        english["options"] = json!({"system": "Write in English", "temperature": 0.0});
        let mut capped = rewrite_body();
        capped["options"] = json!({"system": "Write in English", "temperature": 0.0, "max_tokens": 64});

        let (_, a) = post_generate(app(make()), french).await;
        let (_, b) = post_generate(app(make()), english.clone()).await;
        let (_, c) = post_generate(app(make()), capped).await;
        assert_ne!(a["cache_key"], b["cache_key"]);
        assert_ne!(b["cache_key"], c["cache_key"]);

        let mut slower = english;
        slower["options"]["timeout_ms"] = json!(30_000);
        let (_, d) = post_generate(app(make()), slower).await;
        assert_eq!(b["cache_key"], d["cache_key"]);
    }

    #[tokio::test]
    async fn test_blank_prompt_id_is_bad_request() {
        let (status, body) = post_generate(
            app(ScriptedProvider::new("scripted")),
            json!({"prompt_id": "  "}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_prompt_is_configuration_error() {
        let (status, body) = post_generate(
            app(ScriptedProvider::new("scripted")),
            json!({"prompt_id": "does_not_exist"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn test_no_healthy_provider_is_service_unavailable() {
        let (status, body) = post_generate(
            app(ScriptedProvider::new("down").healthy(false)),
            rewrite_body(),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "PROVIDER_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_exhaustion_is_bad_gateway() {
        let provider = ScriptedProvider::new("scripted").fail("A", 500).fail("B", 500);
        let (status, body) = post_generate(app(provider), rewrite_body()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "GENERATION_FAILED");
    }

    #[tokio::test]
    async fn test_list_prompts_returns_builtins_sorted() {
        let response = app(ScriptedProvider::new("scripted"))
            .oneshot(
                Request::builder()
                    .uri("/api/v1/prompts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();

        let ids: Vec<&str> = body["prompts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect();
        assert_eq!(
            ids,
            vec!["bullet_rewrite", "jd_parse", "resume_score", "summary_tailor"]
        );
        assert!(body["prompts"][0].get("body").is_none());
        assert!(body["prompts"][0]["version"].is_string());
    }
}
