//! bizmcp server library
//!
//! An MCP (Model Context Protocol) server speaking JSON-RPC 2.0 over HTTP.
//! Each tool call is forwarded to one endpoint of the business API and the
//! outcome is returned to the client as text.

pub mod config;
pub mod http;
pub mod mcp;
pub mod server;
pub mod session;
pub mod stats;

#[cfg(test)]
mod test_support;

pub use server::{BridgeServer, RunningServer, ShutdownReport};
