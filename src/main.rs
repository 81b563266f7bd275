use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

mod api;
mod config;
mod discovery;
mod engine;
mod error;
mod logparse;
mod models;

use crate::engine::Engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_ansi(true)
        .init();

    let config = config::load_config(Path::new("services.config.json"))?;

    let engine = Arc::new(Engine::new(config));
    let api_port = engine.config.api_port;

    let engine_for_api = Arc::clone(&engine);
    tokio::spawn(async move {
        api::start_server(api_port, engine_for_api).await;
    });

    let engine_clone = Arc::clone(&engine);
    tokio::spawn(async move {
        if let Err(e) = engine_clone.run().await {
            tracing::error!("Status engine failed: {}", e);
        }
    });

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Closing status dashboard...");

    Ok(())
}
