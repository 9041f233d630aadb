use std::sync::Arc;

use crate::generation::orchestrator::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Stateless and reentrant; one instance serves every request.
    pub orchestrator: Arc<Orchestrator>,
}
