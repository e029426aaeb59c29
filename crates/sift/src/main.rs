//! sift — multi-agent analysis pipeline server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sift_gateway::cache::{MemoryResponseCache, ResponseCache};
use sift_gateway::gateway::InferenceGateway;
use sift_gateway::ledger::{BudgetLedger, MemoryBudgetLedger};
use sift_llm::provider::Provider;
use sift_llm::{AnthropicConfig, AnthropicProvider, OpenAiConfig, OpenAiProvider};
use sift_runtime::artifacts::{ArtifactSink, MemoryArtifactSink};
use sift_runtime::bus::EventBus;
use sift_runtime::context::{ContextAssembler, PromptContextAssembler};
use sift_runtime::orchestrator::{Orchestrator, OrchestratorConfig};
use sift_server::{router, AllowAllSources, AppState};
use sift_settings::{load_settings_from_path, settings_path, ProviderEndpoint, Settings};
use sift_store::{new_file_pool, RunStore};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Multi-agent analysis pipeline server.
#[derive(Parser, Debug)]
#[command(name = "sift", version, about)]
struct Args {
    /// Bind address override.
    #[arg(long)]
    host: Option<String>,

    /// Bind port override.
    #[arg(long)]
    port: Option<u16>,

    /// Database file override.
    #[arg(long)]
    db: Option<String>,

    /// Settings file path (default: ~/.sift/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn api_key_from(endpoint: &ProviderEndpoint) -> String {
    std::env::var(&endpoint.api_key_env).unwrap_or_else(|_| {
        warn!(var = %endpoint.api_key_env, "provider API key env var not set");
        String::new()
    })
}

fn build_state(settings: Arc<Settings>) -> anyhow::Result<AppState> {
    let pool = new_file_pool(&settings.server.db_path, 8)
        .with_context(|| format!("opening database at {}", settings.server.db_path))?;
    let store = Arc::new(RunStore::new(pool).context("running migrations")?);

    let mut primary_config = AnthropicConfig::new(
        api_key_from(&settings.providers.primary),
        settings.providers.primary.model.clone(),
    );
    primary_config.base_url = settings.providers.primary.base_url.clone();
    primary_config.timeout = Duration::from_secs(settings.providers.primary.timeout_secs);

    let mut fallback_config = OpenAiConfig::new(
        api_key_from(&settings.providers.fallback),
        settings.providers.fallback.model.clone(),
    );
    fallback_config.base_url = settings.providers.fallback.base_url.clone();
    fallback_config.timeout = Duration::from_secs(settings.providers.fallback.timeout_secs);

    let ledger: Arc<dyn BudgetLedger> = Arc::new(MemoryBudgetLedger::new());
    let gateway = Arc::new(
        InferenceGateway::new(
            Arc::new(AnthropicProvider::new(primary_config)) as Arc<dyn Provider>,
            Arc::new(OpenAiProvider::new(fallback_config)) as Arc<dyn Provider>,
            Arc::new(MemoryResponseCache::new()) as Arc<dyn ResponseCache>,
            Arc::clone(&ledger),
        )
        .with_cache_ttl(Duration::from_secs(settings.cache.ttl_hours * 3600)),
    );

    let bus = Arc::new(EventBus::with_capacity(
        settings.pipeline.event_channel_capacity,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        gateway,
        Arc::clone(&bus),
        Arc::new(PromptContextAssembler) as Arc<dyn ContextAssembler>,
        Arc::new(MemoryArtifactSink::new()) as Arc<dyn ArtifactSink>,
        OrchestratorConfig {
            max_concurrent_runs: settings.pipeline.max_concurrent_runs,
            daily_token_limit: settings.budgets.daily_tokens,
            max_step_tokens: settings.budgets.max_step_tokens,
        },
    ));

    Ok(AppState {
        store,
        orchestrator,
        bus,
        ledger,
        sources: Arc::new(AllowAllSources),
        settings,
        metrics: Some(sift_server::metrics::install_recorder()),
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let path = args.settings.unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path).context("loading settings")?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(db) = args.db {
        settings.server.db_path = db;
    }
    sift_settings::init_settings(settings.clone());
    let settings = Arc::new(settings);

    let bind = format!("{}:{}", settings.server.host, settings.server.port);
    let state = build_state(Arc::clone(&settings))?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(%bind, db = %settings.server.db_path, "sift server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
