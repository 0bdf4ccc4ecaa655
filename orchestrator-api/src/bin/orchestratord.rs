use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use orchestrator_core::{Config, OrchestratorEngine};
use orchestrator_api::{build_router, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Run the orchestrator daemon (§6: `orchestrator serve`).
#[derive(Debug, Parser)]
#[command(name = "orchestratord")]
struct Cli {
    /// Override `ORCHESTRATOR_ADDR`.
    #[arg(long)]
    addr: Option<String>,

    /// Bind port; overrides the port portion of the resolved address.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(addr) = cli.addr {
        config.orchestrator_addr = addr;
    }
    if let Some(port) = cli.port {
        let host = config
            .orchestrator_addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        config.orchestrator_addr = format!("{host}:{port}");
    }

    let addr = config.orchestrator_addr.clone();
    let engine = Arc::new(OrchestratorEngine::new(config));
    let router = build_router(AppState::new(engine));

    tracing::info!(%addr, "orchestrator listening");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
