use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use resume_gen_api::config::Config;
use resume_gen_api::generation::{HeuristicRepair, Orchestrator};
use resume_gen_api::llm_client::registry::spawn_health_probe;
use resume_gen_api::llm_client::ProviderRegistry;
use resume_gen_api::prompts::PromptRegistry;
use resume_gen_api::routes::build_router;
use resume_gen_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on a missing model chain or unparsable values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = &config.rust_log;
            EnvFilter::new(format!(
                "resume_gen_api={level},{}={level},tower_http={level}",
                env!("CARGO_CRATE_NAME")
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume generation API v{}", env!("CARGO_PKG_VERSION"));

    // Prompt library (read-only for the life of the process)
    let prompts = PromptRegistry::builtin();
    info!("Prompt library loaded ({} templates)", prompts.len());

    // Providers, in configured order
    let providers = Arc::new(ProviderRegistry::from_config(&config)?);
    providers.probe_all().await;
    for status in providers.health_report() {
        info!(
            "Provider '{}': {}",
            status.name,
            if status.healthy { "healthy" } else { "unavailable" }
        );
    }
    if providers.active().is_none() {
        warn!("No generation provider is healthy yet; requests will fail until one recovers");
    }
    let _probe = spawn_health_probe(Arc::clone(&providers), config.health_probe_interval());

    info!("Default model chain: {:?}", config.models.ordered(None));

    let orchestrator = Orchestrator::new(
        prompts,
        providers,
        config.models.clone(),
        Arc::new(HeuristicRepair),
    );

    // Build app state
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the web app host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
