//! MCP (Model Context Protocol) bridge
//!
//! Exposes the business API as a fixed set of MCP tools. A request flows
//! through three layers:
//!
//! - **`dispatcher`**: decodes JSON-RPC envelopes, enforces the handshake
//!   and tracks per-peer sessions
//! - **`gateway`**: validates arguments and maps each tool onto exactly one
//!   downstream call, normalizing the outcome to text
//! - **`downstream`**: the HTTP transport to the business API
//!
//! MCP Protocol: <https://modelcontextprotocol.io/>

pub mod dispatcher;
pub mod downstream;
mod error;
pub mod gateway;
pub mod tools;

pub use dispatcher::{Dispatch, Dispatcher, SERVER_NAME};
pub use downstream::{Downstream, DownstreamError, DownstreamRequest, HttpDownstream};
pub use error::McpError;
pub use gateway::{Gateway, ToolCallResult, ToolInvocation};
pub use tools::{ArgumentError, ParamKind, ParamSpec, ToolRegistry, ToolSpec};
