use std::sync::Arc;

use anyhow::Context;
use pdfrag::config::CONFIG_FILE;
use pdfrag::{RagConfig, RagSession};
use pdfrag_server::{AppState, ServerConfig, build_embedder, run_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("PDFRAG_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let figment = RagConfig::figment(CONFIG_FILE);
    let rag_config = RagConfig::from_figment(&figment).context("invalid pdfrag configuration")?;
    let server_config =
        ServerConfig::from_figment(&figment).context("invalid [server] configuration")?;

    let embedder = build_embedder(&rag_config)?;
    info!(space = %embedder.space(), "embedder ready");

    let session = RagSession::open(rag_config, embedder)
        .await
        .context("failed to open vector index")?;
    run_server(server_config, AppState::new(Arc::new(session))).await
}
