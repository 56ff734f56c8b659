//! Dissent Server - standalone entry point for the debate API
//!
//! A thin wrapper around `dissent-api` that wires environment configuration
//! into a runnable binary.

use anyhow::{Context, Result};
use dissent_api::{DissentServer, ServerConfig};
use dissent_llm::LlmConfig;
use dissent_runtime::DebateConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dissent_api::init_tracing();

    tracing::info!("Starting Dissent server");

    let llm_config = LlmConfig::from_env().context("invalid provider configuration")?;
    let debate_config = DebateConfig::from_env().context("invalid debate configuration")?;
    let config = ServerConfig::from_env();

    tracing::info!(
        addr = %config.addr,
        timeout_secs = config.timeout.as_secs(),
        max_agents = debate_config.max_agents,
        "Configuration loaded"
    );

    let server = DissentServer::new(config, llm_config, debate_config).map_err(|e| {
        tracing::error!("Failed to initialize server: {}", e);
        e
    })?;

    server.run().await.map_err(|e| {
        tracing::error!("Server error during execution: {}", e);
        e
    })?;

    Ok(())
}
