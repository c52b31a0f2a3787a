//! Provost agent server binary — wires settings, store, gateway, backend,
//! and the HTTP server together.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use provost_llm::{GeminiConfig, GeminiGateway};
use provost_runtime::Orchestrator;
use provost_server::{AppState, build_router, metrics};
use provost_settings::{ProvostSettings, load_settings, load_settings_from_path};
use provost_store::{ConnectionConfig, SessionStore, new_pool, run_migrations};
use provost_tools::RestPortalBackend;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Provost — the conversational agent of the university administration portal.
#[derive(Debug, Parser)]
#[command(name = "provost", version)]
struct Cli {
    /// Settings file (defaults to ~/.provost/settings.json).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the database path.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load(cli: &Cli) -> anyhow::Result<ProvostSettings> {
    let mut settings = match &cli.settings {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => load_settings().context("loading settings")?,
    };
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(db) = &cli.db {
        settings.database.path = db.display().to_string();
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let settings = load(&cli)?;
    provost_settings::init_settings(settings.clone());

    let metrics_handle = metrics::install_recorder();

    let pool = new_pool(
        std::path::Path::new(&settings.database.path),
        &ConnectionConfig::default(),
    )
    .context("opening database")?;
    {
        let conn = pool.get().context("checking out migration connection")?;
        let applied = run_migrations(&conn).context("running migrations")?;
        info!(applied, db = %settings.database.path, "database ready");
    }
    let store = Arc::new(SessionStore::new(pool));

    let gateway = Arc::new(GeminiGateway::new(GeminiConfig {
        model: settings.gateway.model.clone(),
        base_url: settings.gateway.base_url.clone(),
        api_key: settings.gateway.api_key.clone(),
    }));
    let backend = Arc::new(RestPortalBackend::new(settings.backend.base_url.clone()));

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        gateway,
        backend,
        settings.orchestrator.max_turns,
        settings.orchestrator.max_concurrent_runs,
    ));

    let router = build_router(AppState {
        orchestrator: Arc::clone(&orchestrator),
        metrics: metrics_handle,
    });

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("parsing bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, model = %settings.gateway.model, "provost agent listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(orchestrator))
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal(orchestrator: Arc<Orchestrator>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, cancelling active runs");
    orchestrator.shutdown();
}
