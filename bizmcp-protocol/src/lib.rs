//! bizmcp-protocol: Wire types shared by the bizmcp server and client
//!
//! This crate defines the JSON-RPC 2.0 envelopes exchanged over `POST /mcp`
//! and the MCP payloads carried inside them (initialize handshake, tool
//! catalog, tool results).

pub mod messages;
pub mod types;

// Re-export main types at crate root
pub use messages::{
    methods, parse_request, EnvelopeError, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    JSONRPC_VERSION, SESSION_REQUIRED,
};
pub use types::{
    CallToolParams, Implementation, InitializeParams, InitializeResult, ServerCapabilities,
    Tool, ToolContent, ToolResult, ToolsCapability, ToolsListResult, PROTOCOL_VERSION,
};
