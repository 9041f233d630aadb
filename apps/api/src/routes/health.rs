use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Service version, per-provider health and the default model chain.
/// `status` is "degraded" when no provider is healthy.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let providers = state.orchestrator.providers().health_report();
    let status = if providers.iter().any(|p| p.healthy) {
        "ok"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "service": "resume-gen-api",
        "providers": providers,
        "models": state.orchestrator.models().ordered(None),
    }))
}
