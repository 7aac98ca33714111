mod automation;
mod config;
mod cover_letter;
mod db;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::automation::browser::ChromiumLauncher;
use crate::automation::orchestrator::Orchestrator;
use crate::automation::store::PgApplicationStore;
use crate::config::Config;
use crate::cover_letter::{CoverLetterWriter, LlmCoverLetter, TemplateCoverLetter};
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting autoapply v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgApplicationStore::new(db));

    // Cover letters: LLM when a key is configured, template otherwise
    let cover_letters: Arc<dyn CoverLetterWriter> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone())?;
            info!("LLM cover letters enabled (model: {})", llm_client::MODEL);
            Arc::new(LlmCoverLetter::new(llm))
        }
        None => {
            info!("ANTHROPIC_API_KEY not set; using template cover letters");
            Arc::new(TemplateCoverLetter)
        }
    };

    let settings = config.automation_settings();
    let launcher = Arc::new(ChromiumLauncher::new(
        config.browser_headless,
        config.chrome_executable.clone(),
        settings.navigation_timeout,
    ));

    info!(
        "Automation: dry_run={} navigation_timeout={}s screenshots={}",
        settings.dry_run,
        settings.navigation_timeout.as_secs(),
        settings.screenshot_dir.display()
    );
    let engine = Arc::new(Orchestrator::new(
        store.clone(),
        launcher,
        cover_letters,
        settings,
    ));

    // Build app state
    let state = AppState { store, engine };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
