//! MCP bridge client
//!
//! Speaks JSON-RPC over `POST /mcp`. The server keys sessions by the peer
//! socket address, so every request must travel over the same pooled
//! connection: the HTTP client keeps exactly one idle connection and never
//! expires it. When that connection is lost anyway the server no longer
//! knows the caller, and the next tool call repeats the handshake once
//! before it is re-issued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bizmcp_protocol::{
    methods, Implementation, InitializeParams, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    Tool, ToolResult, ToolsListResult,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::error::ClientError;

/// Name announced in `clientInfo`
pub const CLIENT_NAME: &str = "mcp-client";

/// Invokes tools by name and returns their text
///
/// Failures are reported as text, never as errors, so the conversation can
/// carry on.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Tools offered to the model
    fn catalog(&self) -> &[Tool];

    async fn invoke(&self, name: &str, arguments: Value) -> String;
}

/// Connection to a running bizmcp server
pub struct BridgeClient {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
    tools: Vec<Tool>,
    server_info: Option<Implementation>,
}

impl BridgeClient {
    /// Client for the bridge at `host:port`
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        Self::with_base_url(format!("http://{}:{}", host, port), timeout)
    }

    /// Client for the bridge at `base_url`, e.g. `http://localhost:3000`
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(None::<Duration>)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            timeout,
            next_id: AtomicU64::new(1),
            tools: Vec::new(),
            server_info: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Server identity from the handshake
    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Probe health, run the handshake and fetch the catalog
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.check_health().await?;

        let result = self.handshake().await?;
        self.server_info = Some(result.server_info);

        self.list_tools().await?;
        info!("Connected to MCP server at {}", self.base_url);
        Ok(())
    }

    /// Refresh the tool catalog
    pub async fn list_tools(&mut self) -> Result<&[Tool], ClientError> {
        let result: ToolsListResult = self.call(methods::TOOLS_LIST, Value::Null).await?;
        let names: Vec<&str> = result.tools.iter().map(|t| t.name.as_str()).collect();
        info!("Loaded {} tools: {:?}", names.len(), names);

        self.tools = result.tools;
        Ok(&self.tools)
    }

    /// Call one tool, reporting any failure as text
    pub async fn invoke(&self, name: &str, arguments: Value) -> String {
        match self.call_tool(name, arguments).await {
            Ok(text) => text,
            Err(e) => {
                error!(tool = name, "Tool call failed: {}", e);
                format!("Error calling tool {}: {}", name, e)
            }
        }
    }

    /// Release the connection
    pub async fn disconnect(self) {
        drop(self.http);
        info!("Disconnected from MCP server");
    }

    /// Send `initialize` followed by `notifications/initialized`
    async fn handshake(&self) -> Result<InitializeResult, ClientError> {
        let params = InitializeParams::for_client(Implementation::new(
            CLIENT_NAME,
            env!("CARGO_PKG_VERSION"),
        ));
        let result: InitializeResult = self.call(methods::INITIALIZE, to_params(&params)?).await?;
        info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            protocol = %result.protocol_version,
            "MCP server initialized"
        );

        self.notify(methods::INITIALIZED).await?;
        info!("MCP server initialization completed");
        Ok(result)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ClientError> {
        let params = json!({"name": name, "arguments": arguments});
        let result = match self.call::<ToolResult>(methods::TOOLS_CALL, params.clone()).await {
            Err(ClientError::Rpc(e)) if e.is_session_required() => {
                warn!(tool = name, "Session lost with the connection, repeating handshake");
                self.handshake().await?;
                self.call(methods::TOOLS_CALL, params).await?
            }
            other => other?,
        };
        if result.is_error == Some(true) {
            debug!(tool = name, "Tool reported an error");
        }
        Ok(result
            .first_text()
            .map(str::to_string)
            .unwrap_or_else(|| "No response from tool".to_string()))
    }

    async fn check_health(&self) -> Result<(), ClientError> {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                // Drain so the connection goes back to the pool
                response.bytes().await?;
                Ok(())
            }
            Ok(response) => {
                warn!(
                    "Health check failed with status {}, assuming server is running",
                    response.status()
                );
                Ok(())
            }
            Err(e) if e.is_connect() => Err(ClientError::Unreachable {
                addr: self.base_url.clone(),
                source: e,
            }),
            Err(e) => {
                warn!("Health check failed, assuming server is running: {}", e);
                Ok(())
            }
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        debug!(method, id, "Sending request");

        let response = self.post(&request).await?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        let envelope: JsonRpcResponse = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => return Err(ClientError::Http(status.as_u16())),
            Err(e) => return Err(ClientError::Decode(e.to_string())),
        };

        let result = envelope.into_result().map_err(ClientError::Rpc)?;
        serde_json::from_value(result).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn notify(&self, method: &str) -> Result<(), ClientError> {
        let notification = JsonRpcRequest::notification(method, Value::Null);
        let response = self.post(&notification).await?;
        let status = response.status();
        response.bytes().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            warn!(method, "Notification answered with HTTP {}", status);
        }
        Ok(())
    }

    async fn post(&self, request: &JsonRpcRequest) -> Result<reqwest::Response, ClientError> {
        self.http
            .post(format!("{}/mcp", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else if err.is_connect() {
            ClientError::Unreachable {
                addr: self.base_url.clone(),
                source: err,
            }
        } else {
            ClientError::Transport(err)
        }
    }
}

#[async_trait]
impl ToolInvoker for BridgeClient {
    fn catalog(&self) -> &[Tool] {
        self.tools()
    }

    async fn invoke(&self, name: &str, arguments: Value) -> String {
        BridgeClient::invoke(self, name, arguments).await
    }
}

fn to_params<T: serde::Serialize>(params: &T) -> Result<Value, ClientError> {
    serde_json::to_value(params).map_err(|e| ClientError::Decode(e.to_string()))
}
