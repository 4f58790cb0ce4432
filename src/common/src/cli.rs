use clap::{Args, Subcommand};
use std::path::PathBuf;

/// CLI arguments shared by every adapter binary
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Subcommands available on every adapter binary
#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommonCommands {
    /// Start the service (default behavior)
    #[default]
    Start,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Log level selected by the verbosity flags
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging; `RUST_LOG` wins over the CLI flags when set
    pub fn init_logging(args: &CommonArgs) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("Remote Read Adapter Configuration:");
            println!("=================================");
            println!("Listen address: {}", config.server.listen_addr);
            println!("Datadog site: {}", config.datadog.site);
            println!(
                "Datadog credentials: api key {}, app key {}",
                presence(&config.datadog.api_key),
                presence(&config.datadog.app_key)
            );
            println!("Backend timeout: {:?}", config.datadog.timeout);
            println!("Query concurrency: {}", config.query_concurrency);
            println!("Series identity: {:?}", config.series_identity);
            println!("Metric mappings: {}", config.mappings.len());
            if let Some(location) = &config.custom.mapping.location {
                println!("Custom mapping file: {}", location.display());
            }
            println!("Ignored labels: {}", config.ignore_labels.join(", "));
            for (name, value) in &config.add_labels {
                println!("Added label: {name}={value}");
            }
        }
        Ok(())
    }

    fn presence(secret: &Option<String>) -> &'static str {
        if secret.is_some() { "set" } else { "missing" }
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        if config.server.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            anyhow::bail!(
                "Listen address '{}' is not a valid socket address",
                config.server.listen_addr
            );
        }

        if config.datadog.site.is_empty() {
            anyhow::bail!("Datadog site cannot be empty");
        }

        if config.query_concurrency == 0 {
            anyhow::bail!("Query concurrency must be at least 1");
        }

        if let Some((name, _)) = config.mappings.iter().find(|(_, target)| target.is_empty()) {
            anyhow::bail!("Mapping for metric '{name}' has an empty target");
        }

        if config.datadog.api_key.is_none() || config.datadog.app_key.is_none() {
            log::warn!("Datadog API or application key is not configured");
        }

        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle common CLI commands that don't require starting services
    pub async fn handle_common_command(
        command: &CommonCommands,
        config: &Configuration,
    ) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            CommonCommands::Start => Ok(false),
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
