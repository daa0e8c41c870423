//! RAG server binary
//!
//! Run with: cargo run -p ragline --bin ragline-server
//!
//! Reads an optional TOML file named by `RAGLINE_CONFIG`, then `.env` and
//! environment overrides.

use std::path::PathBuf;

use ragline::{RagConfig, RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragline=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var_os("RAGLINE_CONFIG").map(PathBuf::from);
    let config = RagConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!(
        "  - Embeddings: {:?} {} ({} dims)",
        config.embeddings.provider,
        config.embeddings.model(),
        config.embeddings.dimensions
    );
    tracing::info!("  - Index: {:?}", config.index.backend);
    tracing::info!("  - LLM: {:?} {}", config.llm.provider, config.llm.model());
    tracing::info!(
        "  - Chunking: {} tokens, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
