//! MCP error types

use bizmcp_protocol::{EnvelopeError, JsonRpcError};

use crate::session::SessionError;

/// Request-level dispatcher errors
///
/// Tool failures never reach this type; they travel as text inside a
/// successful `tools/call` result.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Envelope could not be decoded
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Method not found
    #[error("Unknown method: {0}")]
    MethodNotFound(String),

    /// Invalid parameters
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Request arrived before `initialize`
    #[error(transparent)]
    Session(#[from] SessionError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        JsonRpcError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PeerId;
    use std::net::SocketAddr;

    #[test]
    fn test_every_error_maps_to_internal_error() {
        let peer = PeerId::new(SocketAddr::from(([127, 0, 0, 1], 9)));
        let errors = [
            McpError::MethodNotFound("resources/list".into()),
            McpError::InvalidParams("Missing 'name' parameter".into()),
            McpError::Session(SessionError::NotInitialized(peer)),
            McpError::Envelope(EnvelopeError::Syntax("eof".into())),
        ];

        for err in errors {
            let detail = err.to_string();
            let rpc: JsonRpcError = err.into();
            assert_eq!(rpc.code, -32603);
            assert_eq!(rpc.message, "Internal error");
            assert_eq!(rpc.detail(), Some(detail.as_str()));
        }
    }

    #[test]
    fn test_method_not_found_detail() {
        let rpc: JsonRpcError = McpError::MethodNotFound("ping".into()).into();
        assert_eq!(rpc.detail(), Some("Unknown method: ping"));
    }

    #[test]
    fn test_session_detail_mentions_initialize() {
        let peer = PeerId::new(SocketAddr::from(([10, 0, 0, 1], 4000)));
        let rpc: JsonRpcError = McpError::from(SessionError::NotInitialized(peer)).into();
        let detail = rpc.detail().unwrap();
        assert!(detail.contains("10.0.0.1:4000"));
        assert!(detail.contains("initialize"));
        assert!(detail.starts_with(bizmcp_protocol::SESSION_REQUIRED));
        assert!(rpc.is_session_required());
    }
}
