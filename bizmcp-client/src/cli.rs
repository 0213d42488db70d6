//! Command-line arguments

use std::time::Duration;

use bizmcp_client::llm::{API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};
use bizmcp_client::OpenRouterConfig;
use clap::Parser;

/// Chat with an LLM that can use the business server's tools
#[derive(Parser, Debug)]
#[command(name = "bizmcp")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host of the running bizmcp server
    #[arg(long, env = "BIZMCP_HOST", default_value = "localhost")]
    pub host: String,

    /// Port of the running bizmcp server
    #[arg(short, long, env = "BIZMCP_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Model to request completions from
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// OpenRouter API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat-completions base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub llm_base_url: String,

    /// Timeout for calls to the bizmcp server, in seconds
    ///
    /// Keep this above the server's `downstream.timeout_secs`.
    #[arg(long, default_value_t = 45)]
    pub timeout_secs: u64,
}

impl Args {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// LLM settings; an absent key is left empty and rejected by the client
    pub fn llm_config(&self) -> OpenRouterConfig {
        OpenRouterConfig::new(self.api_key.clone().unwrap_or_default())
            .with_model(&self.model)
            .with_base_url(&self.llm_base_url)
    }
}
