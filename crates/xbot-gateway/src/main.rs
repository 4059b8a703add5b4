//! `xbot` binary: loads config, selects storage and serves the gateway.

use anyhow::Context;
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;
use xbot_config::{LayeredConfigOptions, XbotConfig};

/// Command-line options for the gateway.
#[derive(Parser)]
#[command(name = "xbot", version)]
struct Cli {
    /// Extra config file applied after the discovered layers (repeatable)
    #[arg(long = "config")]
    config: Vec<PathBuf>,
    /// Message storage override: mongodb, s3 or auto
    #[arg(long)]
    storage: Option<String>,
    /// Listener port override
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();

    let cli = Cli::parse();
    info!(
        "starting gateway (runtime_configs={}, storage_set={}, port_set={})",
        cli.config.len(),
        cli.storage.is_some(),
        cli.port.is_some()
    );

    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let options = cli
        .config
        .iter()
        .fold(LayeredConfigOptions::new(&cwd), |options, path| {
            options.with_runtime_path(path)
        });
    let layered =
        XbotConfig::load_layered_with_options(options).context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    let mut config = layered.config;
    config
        .apply_env_overrides()
        .context("failed to apply environment overrides")?;
    if let Some(storage) = cli.storage {
        config.storage.message_storage = storage;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate().context("invalid effective config")?;

    let state = xbot_gateway::build_state(&config)
        .await
        .context("failed to initialize gateway")?;

    let figment = rocket::Config::figment()
        .merge(("address", config.server.address.clone()))
        .merge(("port", config.server.port));
    info!(
        "listening (address={}, port={}, host={})",
        config.server.address, config.server.port, config.server.host
    );
    xbot_gateway::server(figment, state)
        .launch()
        .await
        .map_err(|err| anyhow::anyhow!("gateway server failed: {err}"))?;
    Ok(())
}
