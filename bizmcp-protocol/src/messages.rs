//! JSON-RPC 2.0 envelopes
//!
//! A request carries an `id` and expects exactly one response with the same
//! `id`. An envelope without an `id` is a notification and is never answered.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol tag carried by every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Method names understood by the bridge
pub mod methods {
    /// Opens (or refreshes) the caller's session
    pub const INITIALIZE: &str = "initialize";
    /// Client acknowledgement that the handshake is complete
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Returns the tool catalog
    pub const TOOLS_LIST: &str = "tools/list";
    /// Invokes one tool
    pub const TOOLS_CALL: &str = "tools/call";
}

/// Leading text of the detail sent when a request arrives on a connection
/// that has no session; the client answers it by repeating the handshake
pub const SESSION_REQUIRED: &str = "session not initialized";

/// JSON-RPC 2.0 request or notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Correlation ID; absent (or null) on notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Method parameters (optional)
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Create a request that expects a response
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Create a notification (no id, never answered)
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Whether this envelope is a notification
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID that this response is for (null when it could not be recovered)
    #[serde(default)]
    pub id: Value,
    /// Result (mutually exclusive with error)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (mutually exclusive with result)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Split the response into its result or error
    ///
    /// A response carrying neither is reported as an internal error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Err(JsonRpcError::internal("response carried neither result nor error")),
        }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({code})")]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Internal error: used for every malformed or unroutable request
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Create a new JSON-RPC error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new JSON-RPC error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// `-32603 Internal error` with the causing detail in `data`
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::with_data(Self::INTERNAL_ERROR, "Internal error", Value::String(detail.into()))
    }

    /// The `data` field as text, when it is a string
    pub fn detail(&self) -> Option<&str> {
        self.data.as_ref().and_then(Value::as_str)
    }

    /// Whether the server rejected the request for lack of a session
    pub fn is_session_required(&self) -> bool {
        self.code == Self::INTERNAL_ERROR
            && self
                .detail()
                .is_some_and(|detail| detail.starts_with(SESSION_REQUIRED))
    }
}

/// Failure to decode an inbound envelope
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnvelopeError {
    /// Body is not JSON at all; no id can be recovered
    #[error("invalid JSON: {0}")]
    Syntax(String),

    /// Body is JSON but not a valid request
    #[error("invalid request: {reason}")]
    Invalid {
        /// Id recovered from the raw envelope, if any
        id: Option<Value>,
        /// What was wrong with it
        reason: String,
    },
}

impl EnvelopeError {
    /// Id of the offending envelope, when it could be recovered
    pub fn id(&self) -> Option<&Value> {
        match self {
            Self::Syntax(_) => None,
            Self::Invalid { id, .. } => id.as_ref(),
        }
    }
}

/// Decode one request or notification from raw bytes
///
/// The id is extracted before the structural check so that a malformed
/// request can still be answered under its own id.
pub fn parse_request(bytes: &[u8]) -> Result<JsonRpcRequest, EnvelopeError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Syntax(e.to_string()))?;

    if !value.is_object() {
        return Err(EnvelopeError::Invalid {
            id: None,
            reason: "envelope must be a JSON object".into(),
        });
    }

    let id = value.get("id").filter(|id| !id.is_null()).cloned();

    let request: JsonRpcRequest =
        serde_json::from_value(value).map_err(|e| EnvelopeError::Invalid {
            id: id.clone(),
            reason: e.to_string(),
        })?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err(EnvelopeError::Invalid {
            id,
            reason: format!(
                "unsupported jsonrpc version '{}', expected '{}'",
                request.jsonrpc, JSONRPC_VERSION
            ),
        });
    }

    Ok(request)
}
