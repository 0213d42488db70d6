//! JSON-RPC method dispatch
//!
//! Decodes an inbound envelope, routes it by method name and produces at
//! most one response. Tool failures are conversational: they come back as a
//! successful `tools/call` result with `isError` set, never as RPC errors.

use std::time::Instant;

use bizmcp_protocol::{
    methods, parse_request, CallToolParams, EnvelopeError, Implementation, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolResult, ToolsListResult,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::McpError;
use super::gateway::Gateway;
use crate::session::{PeerId, SessionTracker};

/// Name reported in `serverInfo`
pub const SERVER_NAME: &str = "business-server-mcp";

/// Longest tool result prefix written to the log
const LOG_RESULT_CHARS: usize = 200;

/// What the transport should send back
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A response envelope for a request with an id
    Reply(JsonRpcResponse),
    /// A notification was consumed; nothing to send
    Accepted,
    /// The body could not be tied to any request id
    Rejected(JsonRpcResponse),
}

/// Protocol dispatcher; owns the session store
pub struct Dispatcher {
    gateway: Gateway,
    sessions: SessionTracker,
    server_info: Implementation,
}

impl Dispatcher {
    pub fn new(gateway: Gateway, sessions: SessionTracker) -> Self {
        Self {
            gateway,
            sessions,
            server_info: Implementation::new(SERVER_NAME, env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    /// Decode raw bytes and dispatch them
    pub async fn dispatch(&self, peer: PeerId, body: &[u8]) -> Dispatch {
        match parse_request(body) {
            Ok(request) => match self.handle(peer, request).await {
                Some(response) => Dispatch::Reply(response),
                None => Dispatch::Accepted,
            },
            Err(err) => {
                warn!(client = %peer, error = %err, "Malformed request");
                Dispatch::from(err)
            }
        }
    }

    /// Handle one decoded envelope; `None` for notifications
    pub async fn handle(&self, peer: PeerId, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        info!(client = %peer, method = %request.method, id = ?request.id, "Received request");

        let Some(id) = request.id else {
            self.handle_notification(peer, &request.method);
            return None;
        };

        let result = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(peer, request.params),
            methods::TOOLS_LIST => self.handle_tools_list(peer),
            methods::TOOLS_CALL => self.handle_tools_call(peer, request.params).await,
            other => Err(McpError::MethodNotFound(other.to_string())),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => {
                warn!(client = %peer, error = %err, "Request failed");
                JsonRpcResponse::error(id, JsonRpcError::from(err))
            }
        })
    }

    fn handle_notification(&self, peer: PeerId, method: &str) {
        match method {
            methods::INITIALIZED => {
                if self.sessions.mark_initialized(peer) {
                    info!(client = %peer, "Initialization completed");
                } else {
                    warn!(client = %peer, "Initialized notification without a session");
                }
            }
            other => debug!(client = %peer, method = other, "Ignoring notification"),
        }
    }

    fn handle_initialize(&self, peer: PeerId, params: Value) -> Result<Value, McpError> {
        // initialize succeeds on any params; clientInfo is recorded when present
        let client_info = serde_json::from_value::<InitializeParams>(params)
            .ok()
            .and_then(|p| p.client_info);

        match &client_info {
            Some(info) => info!(
                client = %peer,
                name = %info.name,
                version = %info.version,
                "Initializing"
            ),
            None => info!(client = %peer, "Initializing without clientInfo"),
        }

        self.sessions.open(peer, client_info);

        let result = InitializeResult::new(self.server_info.clone());
        Ok(serde_json::to_value(result)?)
    }

    fn handle_tools_list(&self, peer: PeerId) -> Result<Value, McpError> {
        self.sessions.touch(peer)?;

        let registry = self.gateway.registry();
        info!(client = %peer, tools = registry.len(), "Listing tools");

        let result = ToolsListResult {
            tools: registry.catalog().to_vec(),
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn handle_tools_call(&self, peer: PeerId, params: Value) -> Result<Value, McpError> {
        let params = parse_call_params(params)?;

        // The entry guard is dropped here, before the downstream call
        self.sessions
            .record_invocation(peer, &params.name, &params.arguments)?;

        info!(client = %peer, tool = %params.name, "Tool call");
        debug!(client = %peer, tool = %params.name, arguments = %params.arguments, "Tool arguments");

        let started = Instant::now();
        let outcome = self.gateway.call(&params.name, &params.arguments).await;
        let elapsed = started.elapsed();

        info!(
            client = %peer,
            tool = %params.name,
            ok = outcome.ok,
            elapsed_ms = elapsed.as_millis() as u64,
            result = %truncate(&outcome.text, LOG_RESULT_CHARS),
            "Tool completed"
        );

        let result = if outcome.ok {
            ToolResult::text(outcome.text)
        } else {
            ToolResult::error(outcome.text)
        };
        Ok(serde_json::to_value(result)?)
    }

    /// Log per-session summaries and drop every session
    pub fn shutdown(&self) -> usize {
        info!(clients = self.sessions.len(), "Final stats");
        self.sessions.clear()
    }
}

fn parse_call_params(params: Value) -> Result<CallToolParams, McpError> {
    match params.get("name") {
        Some(Value::String(_)) => {}
        Some(_) => return Err(McpError::InvalidParams("'name' must be a string".into())),
        None => return Err(McpError::InvalidParams("Missing 'name' parameter".into())),
    }
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Requests with a recoverable id are answered; the rest are rejected
impl From<EnvelopeError> for Dispatch {
    fn from(err: EnvelopeError) -> Self {
        let id = err.id().cloned();
        let response =
            JsonRpcResponse::error(id.clone().unwrap_or(Value::Null), McpError::from(err).into());
        match id {
            Some(_) => Dispatch::Reply(response),
            None => Dispatch::Rejected(response),
        }
    }
}
