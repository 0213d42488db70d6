//! bizmcp server - MCP bridge daemon

use clap::Parser;
use tracing::info;

use bizmcp_server::config::{ConfigLoader, DEFAULT_CONFIG_TOML};
use bizmcp_server::BridgeServer;
use bizmcp_utils::{init_logging_with_config, LogConfig, Result};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", DEFAULT_CONFIG_TOML);
        return Ok(());
    }

    let mut config = ConfigLoader::load_and_validate(args.config.as_deref())?;
    args.apply(&mut config);
    // Flags may have replaced validated values
    ConfigLoader::validate(&config)?;

    init_logging_with_config(
        LogConfig::server().with_overrides(config.logging.output, &config.logging.filter),
    )?;

    info!("bizmcp server v{} starting", env!("CARGO_PKG_VERSION"));

    let running = BridgeServer::new(config)?.bind().await?;

    tokio::signal::ctrl_c().await?;
    info!("Received interrupt");

    let report = running.shutdown().await;
    info!(
        sessions = report.sessions_cleared,
        aborted_connections = report.connections.aborted,
        "Server stopped"
    );

    Ok(())
}
