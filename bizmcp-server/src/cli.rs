//! Command-line arguments

use std::path::PathBuf;

use bizmcp_server::config::AppConfig;
use clap::Parser;

/// MCP bridge exposing the business API as tools
#[derive(Parser, Debug)]
#[command(name = "bizmcp-server")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (defaults to the XDG config location)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:3000
    #[arg(short, long, env = "BIZMCP_LISTEN")]
    pub listen: Option<String>,

    /// Base URL of the business API
    #[arg(short, long, env = "BIZMCP_DOWNSTREAM_URL")]
    pub downstream_url: Option<String>,

    /// Accept requests from peers that skipped `initialize`
    #[arg(long)]
    pub lenient_handshake: bool,

    /// Print the default configuration and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(listen) = &self.listen {
            config.server.listen_addr = listen.clone();
        }
        if let Some(url) = &self.downstream_url {
            config.downstream.base_url = url.clone();
        }
        if self.lenient_handshake {
            config.sessions.require_initialize = false;
        }
    }
}
