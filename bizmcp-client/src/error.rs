//! Client error types

use std::error::Error as StdError;
use std::time::Duration;

use bizmcp_protocol::JsonRpcError;
use bizmcp_utils::BridgeError;
use thiserror::Error;

/// Errors talking to the MCP bridge
#[derive(Debug, Error)]
pub enum ClientError {
    /// Health probe could not open a connection
    #[error("cannot connect to MCP server at {addr}; make sure it is running")]
    Unreachable {
        addr: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("MCP request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("MCP transport error: {}", error_chain(.0))]
    Transport(#[from] reqwest::Error),

    /// Non-2xx status without a JSON-RPC envelope
    #[error("MCP server returned HTTP {0}")]
    Http(u16),

    #[error("MCP error: {}", .0.detail().unwrap_or(.0.message.as_str()))]
    Rpc(JsonRpcError),

    #[error("malformed MCP response: {0}")]
    Decode(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Setup(#[from] BridgeError),
}

/// Errors from the chat-completion backend
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing API key: set OPEN_ROUTER_KEY or pass --api-key")]
    MissingApiKey,

    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed LLM response: {0}")]
    Decode(String),
}

/// An error followed by each of its causes, separated by `: `
fn error_chain(err: &dyn StdError) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("error sending request")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_error_chain_includes_causes() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"));
        assert_eq!(error_chain(&err), "error sending request: connection reset");
    }

    #[test]
    fn test_timeout_display() {
        let err = ClientError::Timeout(Duration::from_secs(45));
        assert_eq!(err.to_string(), "MCP request timed out after 45s");
    }

    #[test]
    fn test_rpc_error_prefers_detail() {
        let err = ClientError::Rpc(JsonRpcError::internal("Unknown method: foo"));
        assert_eq!(err.to_string(), "MCP error: Unknown method: foo");

        let err = ClientError::Rpc(JsonRpcError::new(-32000, "Server busy"));
        assert_eq!(err.to_string(), "MCP error: Server busy");
    }

    #[test]
    fn test_llm_status_display() {
        let err = LlmError::Status {
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "LLM returned HTTP 429: rate limited");
    }

    #[test]
    fn test_llm_error_is_transparent() {
        let err = ClientError::from(LlmError::MissingApiKey);
        assert_eq!(
            err.to_string(),
            "missing API key: set OPEN_ROUTER_KEY or pass --api-key"
        );
    }
}
