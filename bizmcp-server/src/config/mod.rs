//! Configuration management for the bizmcp server
//!
//! Loaded once at startup from `$XDG_CONFIG_HOME/bizmcp/config.toml` (or an
//! explicit path), then overridden by command-line flags.

mod defaults;
mod loader;
mod schema;

pub use defaults::DEFAULT_CONFIG_TOML;
pub use loader::ConfigLoader;
pub use schema::*;
