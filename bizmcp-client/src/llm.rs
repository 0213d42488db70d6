//! Chat-completion client (OpenRouter / OpenAI-compatible)

use std::time::Duration;

use async_trait::async_trait;
use bizmcp_protocol::Tool;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::LlmError;

pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-8b-instruct:free";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const API_KEY_ENV: &str = "OPEN_ROUTER_KEY";

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 1000;
const REFERER: &str = "http://localhost:3000";
const TITLE: &str = "MCP Business Server Client";

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool invocation proposed by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Value,
}

/// What the model answered
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    /// Tool calls in proposal order
    ToolCalls(Vec<ToolCallRequest>),
}

/// A chat-completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete `messages`, offering `tools` when non-empty
    async fn complete(&self, messages: &[ChatMessage], tools: &[Tool]) -> Result<ModelReply, LlmError>;
}

/// OpenRouter connection settings
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl OpenRouterConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<FunctionTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct FunctionTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDef<'a>,
}

#[derive(Debug, Serialize)]
struct FunctionDef<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object
    #[serde(default)]
    arguments: String,
}

impl CompletionResponse {
    fn into_reply(self) -> Result<ModelReply, LlmError> {
        let Some(choice) = self.choices.into_iter().next() else {
            return Ok(ModelReply::Text("No response from LLM".to_string()));
        };

        match choice.message.tool_calls {
            Some(calls) if !calls.is_empty() => calls
                .into_iter()
                .map(|call| {
                    let arguments = parse_arguments(&call.function.arguments).map_err(|e| {
                        LlmError::Decode(format!(
                            "invalid arguments for tool {}: {}",
                            call.function.name, e
                        ))
                    })?;
                    Ok(ToolCallRequest {
                        name: call.function.name,
                        arguments,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ModelReply::ToolCalls),
            _ => Ok(ModelReply::Text(choice.message.content.unwrap_or_default())),
        }
    }
}

fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
}

/// OpenRouter chat-completions client
pub struct OpenRouterClient {
    config: OpenRouterConfig,
    http: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(config: OpenRouterConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    async fn complete(&self, messages: &[ChatMessage], tools: &[Tool]) -> Result<ModelReply, LlmError> {
        let offered = (!tools.is_empty()).then(|| {
            tools
                .iter()
                .map(|tool| FunctionTool {
                    kind: "function",
                    function: FunctionDef {
                        name: &tool.name,
                        description: &tool.description,
                        parameters: &tool.input_schema,
                    },
                })
                .collect::<Vec<_>>()
        });
        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            tool_choice: offered.as_ref().map(|_| "auto"),
            tools: offered,
        };

        debug!(model = %self.config.model, messages = messages.len(), tools = tools.len(), "Requesting completion");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            error!("HTTP error from OpenRouter: {} - {}", status.as_u16(), text);
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Decode(e.to_string()))?;
        parsed.into_reply()
    }
}
