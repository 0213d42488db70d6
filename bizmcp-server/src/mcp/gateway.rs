//! Downstream gateway
//!
//! Turns a tool name and argument bag into exactly one business API call and
//! normalizes the outcome into text. Nothing structured crosses this
//! boundary: the caller only ever sees a [`ToolCallResult`].

use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::downstream::{Downstream, DownstreamError, DownstreamRequest};
use super::tools::{ArgumentError, ToolRegistry};

/// Normalized outcome of one tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallResult {
    pub ok: bool,
    pub text: String,
}

impl ToolCallResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            ok: true,
            text: text.into(),
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            ok: false,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegisterAgentArgs {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportStatusArgs {
    pub agent_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetTasksArgs {
    pub agent_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddNumberArgs {
    pub number: i64,
}

/// A validated, typed tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    RegisterAgent(RegisterAgentArgs),
    ReportStatus(ReportStatusArgs),
    GetTasks(GetTasksArgs),
    AddNumber(AddNumberArgs),
    GetJoke,
}

#[derive(Deserialize)]
struct Registration {
    agent_id: String,
}

#[derive(Deserialize)]
struct StatusAck {
    message: String,
}

#[derive(Deserialize)]
struct TaskListing {
    #[serde(default)]
    tasks: Option<Value>,
}

#[derive(Deserialize)]
struct Sum {
    result: i64,
}

#[derive(Deserialize)]
struct Joke {
    #[serde(default)]
    setup: Option<String>,
    #[serde(default)]
    punchline: Option<String>,
}

fn decode_args<T: DeserializeOwned>(arguments: &Value) -> Result<T, ArgumentError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments.clone()
    };
    serde_json::from_value(arguments).map_err(|e| ArgumentError::Decode(e.to_string()))
}

fn decode_body<T: DeserializeOwned>(body: Value) -> Result<T, DownstreamError> {
    serde_json::from_value(body).map_err(|e| DownstreamError::Decode(e.to_string()))
}

impl ToolInvocation {
    /// Decode an argument bag already checked against the tool's schema
    pub fn decode(tool: &str, arguments: &Value) -> Result<Self, ArgumentError> {
        match tool {
            "register_agent" => Ok(Self::RegisterAgent(decode_args(arguments)?)),
            "report_status" => Ok(Self::ReportStatus(decode_args(arguments)?)),
            "get_tasks" => Ok(Self::GetTasks(decode_args(arguments)?)),
            "add_number" => Ok(Self::AddNumber(decode_args(arguments)?)),
            "get_joke" => Ok(Self::GetJoke),
            other => Err(ArgumentError::Decode(format!(
                "no argument decoder for tool '{}'",
                other
            ))),
        }
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::RegisterAgent(_) => "register_agent",
            Self::ReportStatus(_) => "report_status",
            Self::GetTasks(_) => "get_tasks",
            Self::AddNumber(_) => "add_number",
            Self::GetJoke => "get_joke",
        }
    }

    /// The fixed endpoint for this tool
    pub fn request(&self) -> DownstreamRequest {
        match self {
            Self::RegisterAgent(args) => DownstreamRequest::post(
                "/register",
                json!({"name": args.name, "version": args.version}),
            ),
            Self::ReportStatus(args) => DownstreamRequest::post(
                "/report_status",
                serde_json::to_value(args).unwrap_or_else(|_| {
                    json!({"agent_id": args.agent_id, "status": args.status})
                }),
            ),
            Self::GetTasks(args) => {
                DownstreamRequest::get("/tasks").with_query("agent_id", args.agent_id.clone())
            }
            Self::AddNumber(args) => {
                DownstreamRequest::post("/adder", json!({"number": args.number}))
            }
            Self::GetJoke => DownstreamRequest::get("/joke"),
        }
    }

    /// Format a successful response body
    pub fn render(&self, body: Value) -> Result<String, DownstreamError> {
        match self {
            Self::RegisterAgent(_) => {
                let registration: Registration = decode_body(body)?;
                Ok(format!(
                    "Agent registered successfully. Agent ID: {}",
                    registration.agent_id
                ))
            }
            Self::ReportStatus(_) => {
                let ack: StatusAck = decode_body(body)?;
                Ok(format!("Status reported successfully: {}", ack.message))
            }
            Self::GetTasks(args) => {
                let listing: TaskListing = decode_body(body)?;
                let tasks = listing.tasks.unwrap_or_else(|| json!({}));
                let pretty = serde_json::to_string_pretty(&tasks)
                    .map_err(|e| DownstreamError::Decode(e.to_string()))?;
                Ok(format!("Tasks for agent {}:\n{}", args.agent_id, pretty))
            }
            Self::AddNumber(args) => {
                let sum: Sum = decode_body(body)?;
                Ok(format!("Result: {} + 1 = {}", args.number, sum.result))
            }
            Self::GetJoke => {
                let joke: Joke = decode_body(body)?;
                Ok(format!(
                    "Here's a joke for you:\n\nSetup: {}\nPunchline: {}",
                    joke.setup.unwrap_or_default(),
                    joke.punchline.unwrap_or_default()
                ))
            }
        }
    }

    /// Cause text for a failed call
    ///
    /// A 404 from an agent-scoped endpoint means the agent is unknown.
    pub fn describe_failure(&self, err: &DownstreamError) -> String {
        match (self, err.status()) {
            (Self::ReportStatus(ReportStatusArgs { agent_id, .. }), Some(404))
            | (Self::GetTasks(GetTasksArgs { agent_id }), Some(404)) => {
                format!("Agent not found: {} ({})", agent_id, err)
            }
            _ => err.to_string(),
        }
    }
}

/// Routes tool calls to the business API
pub struct Gateway {
    registry: Arc<ToolRegistry>,
    downstream: Arc<dyn Downstream>,
}

impl Gateway {
    pub fn new(registry: Arc<ToolRegistry>, downstream: Arc<dyn Downstream>) -> Self {
        Self {
            registry,
            downstream,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Validate, call downstream once, and normalize the outcome
    pub async fn call(&self, tool: &str, arguments: &Value) -> ToolCallResult {
        let Some(spec) = self.registry.get(tool) else {
            warn!(tool, "Unknown tool requested");
            return ToolCallResult::failure(format!("Unknown tool: {}", tool));
        };

        let invocation = match spec
            .validate(arguments)
            .and_then(|()| ToolInvocation::decode(tool, arguments))
        {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!(tool, error = %e, "Rejected tool arguments");
                return ToolCallResult::failure(format!("Invalid arguments for {}: {}", tool, e));
            }
        };

        debug!(tool, "Executing tool against business server");

        let outcome = match self.downstream.send(invocation.request()).await {
            Ok(body) => invocation.render(body),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(text) => {
                info!(tool, "Tool completed");
                ToolCallResult::success(text)
            }
            Err(e) => {
                let cause = invocation.describe_failure(&e);
                warn!(tool, error = %cause, "Tool failed");
                ToolCallResult::failure(format!("Error executing {}: {}", tool, cause))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeBusinessApi, StubDownstream};
    use crate::mcp::downstream::HttpDownstream;
    use std::time::Duration;

    fn gateway_with(stub: &Arc<StubDownstream>) -> Gateway {
        Gateway::new(Arc::new(ToolRegistry::new()), stub.clone())
    }

    #[tokio::test]
    async fn test_unknown_tool_skips_downstream() {
        let stub = Arc::new(StubDownstream::new());
        let result = gateway_with(&stub).call("delete_everything", &json!({})).await;

        assert!(!result.ok);
        assert_eq!(result.text, "Unknown tool: delete_everything");
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_argument_skips_downstream() {
        let stub = Arc::new(StubDownstream::new());
        let result = gateway_with(&stub)
            .call("register_agent", &json!({"name": "bot"}))
            .await;

        assert!(!result.ok);
        assert_eq!(
            result.text,
            "Invalid arguments for register_agent: missing required argument 'version'"
        );
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_wrong_type_skips_downstream() {
        let stub = Arc::new(StubDownstream::new());
        let result = gateway_with(&stub)
            .call("add_number", &json!({"number": "forty-two"}))
            .await;

        assert!(!result.ok);
        assert!(result.text.starts_with("Invalid arguments for add_number"));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_add_number_round_trip() {
        let stub = Arc::new(StubDownstream::new().respond("/adder", Ok(json!({"result": 43}))));
        let result = gateway_with(&stub).call("add_number", &json!({"number": 42})).await;

        assert!(result.ok);
        assert_eq!(result.text, "Result: 42 + 1 = 43");
        assert_eq!(stub.calls(), 1);

        let sent = stub.last_request().unwrap();
        assert_eq!(sent.path, "/adder");
        assert_eq!(sent.body, Some(json!({"number": 42})));
    }

    #[tokio::test]
    async fn test_register_agent_text() {
        let stub = Arc::new(
            StubDownstream::new().respond("/register", Ok(json!({"agent_id": "abc-123"}))),
        );
        let result = gateway_with(&stub)
            .call("register_agent", &json!({"name": "ChatBot", "version": "1.0.0"}))
            .await;

        assert_eq!(result, ToolCallResult::success("Agent registered successfully. Agent ID: abc-123"));
    }

    #[tokio::test]
    async fn test_report_status_omits_absent_usage() {
        let stub = Arc::new(
            StubDownstream::new().respond("/report_status", Ok(json!({"message": "Status received"}))),
        );
        let result = gateway_with(&stub)
            .call("report_status", &json!({"agent_id": "a1", "status": "idle", "cpu_usage": 12.5}))
            .await;

        assert_eq!(result.text, "Status reported successfully: Status received");
        assert_eq!(
            stub.last_request().unwrap().body,
            Some(json!({"agent_id": "a1", "status": "idle", "cpu_usage": 12.5}))
        );
    }

    #[tokio::test]
    async fn test_report_status_404_is_agent_not_found() {
        let stub = Arc::new(StubDownstream::new().respond(
            "/report_status",
            Err(DownstreamError::Status {
                status: 404,
                detail: Some("Agent not found".into()),
            }),
        ));
        let result = gateway_with(&stub)
            .call("report_status", &json!({"agent_id": "ghost", "status": "idle"}))
            .await;

        assert!(!result.ok);
        assert!(result.text.starts_with("Error executing report_status: "));
        assert!(result.text.contains("Agent not found: ghost"));
    }

    #[tokio::test]
    async fn test_get_tasks_pretty_prints() {
        let stub = Arc::new(StubDownstream::new().respond(
            "/tasks",
            Ok(json!({"tasks": {"task1": {"priority": "high"}}})),
        ));
        let result = gateway_with(&stub).call("get_tasks", &json!({"agent_id": "a1"})).await;

        assert_eq!(
            result.text,
            "Tasks for agent a1:\n{\n  \"task1\": {\n    \"priority\": \"high\"\n  }\n}"
        );
        assert_eq!(
            stub.last_request().unwrap().query,
            vec![("agent_id", "a1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_joke_text() {
        let stub = Arc::new(StubDownstream::new().respond(
            "/joke",
            Ok(json!({"setup": "Why?", "punchline": "Because."})),
        ));
        let result = gateway_with(&stub).call("get_joke", &Value::Null).await;

        assert_eq!(
            result.text,
            "Here's a joke for you:\n\nSetup: Why?\nPunchline: Because."
        );
    }

    #[tokio::test]
    async fn test_other_status_is_not_agent_not_found() {
        let stub = Arc::new(StubDownstream::new().respond(
            "/joke",
            Err(DownstreamError::Status {
                status: 503,
                detail: Some("Could not fetch joke".into()),
            }),
        ));
        let result = gateway_with(&stub).call("get_joke", &json!({})).await;

        assert_eq!(result.text, "Error executing get_joke: HTTP 503: Could not fetch joke");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let stub = Arc::new(StubDownstream::new().respond("/adder", Ok(json!({"sum": 43}))));
        let result = gateway_with(&stub).call("add_number", &json!({"number": 42})).await;

        assert!(!result.ok);
        assert!(result.text.starts_with("Error executing add_number: malformed response"));
    }

    #[tokio::test]
    async fn test_timeout_text() {
        let stub = Arc::new(StubDownstream::new().respond(
            "/joke",
            Err(DownstreamError::Timeout(Duration::from_secs(30))),
        ));
        let result = gateway_with(&stub).call("get_joke", &json!({})).await;

        assert_eq!(result.text, "Error executing get_joke: request timed out after 30s");
    }

    #[tokio::test]
    async fn test_against_fake_business_api() {
        let api = FakeBusinessApi::start().await;
        let downstream = Arc::new(HttpDownstream::new(&api.base_url(), Duration::from_secs(5)).unwrap());
        let gateway = Gateway::new(Arc::new(ToolRegistry::new()), downstream);

        let registered = gateway
            .call("register_agent", &json!({"name": "bot", "version": "0.1"}))
            .await;
        assert!(registered.ok);
        let agent_id = registered.text.rsplit("Agent ID: ").next().unwrap().to_string();

        let tasks = gateway.call("get_tasks", &json!({"agent_id": agent_id})).await;
        assert!(tasks.ok, "{}", tasks.text);
        assert!(tasks.text.contains("Update inventory"));

        let missing = gateway.call("get_tasks", &json!({"agent_id": "nobody"})).await;
        assert!(!missing.ok);
        assert!(missing.text.contains("Agent not found"));
    }

    #[test]
    fn test_decode_report_status_optional_fields() {
        let invocation = ToolInvocation::decode(
            "report_status",
            &json!({"agent_id": "a", "status": "ok", "memory_usage": null}),
        )
        .unwrap();

        assert_eq!(
            invocation,
            ToolInvocation::ReportStatus(ReportStatusArgs {
                agent_id: "a".into(),
                status: "ok".into(),
                cpu_usage: None,
                memory_usage: None,
            })
        );
        assert_eq!(invocation.tool_name(), "report_status");
    }
}
