use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use querier::{DatadogClient, RemoteReadAdapter, remote_read_router};
use tokio::signal;

#[derive(Parser)]
#[command(name = "remote-read-adapter")]
#[command(about = "Prometheus remote read adapter for the Datadog metrics API")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<AdapterCommands>,
}

#[derive(Subcommand)]
enum AdapterCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for AdapterCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Start)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    let config = utils::load_config(cli.common.config.as_ref())?;

    // Handle common commands that don't require starting the service
    let command = cli.command.unwrap_or_default();
    let AdapterCommands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config).await? {
        return Ok(());
    }

    utils::validate_config(&config)?;

    let client =
        DatadogClient::from_config(&config.datadog).context("Failed to build Datadog client")?;
    log::info!("Querying Datadog at {}", client.base_url());

    let adapter = RemoteReadAdapter::from_config(Arc::new(client), &config);
    log::info!(
        "Loaded {} metric mappings, series identity {:?}",
        config.mappings.len(),
        config.series_identity
    );

    let app = remote_read_router(adapter);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    log::info!("Starting remote read adapter on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
            }
            log::info!("Shutting down remote read adapter");
        })
        .await
        .context("Remote read server failed")?;

    Ok(())
}
