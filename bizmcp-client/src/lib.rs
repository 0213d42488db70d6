//! bizmcp client library
//!
//! Lets an LLM use the business tools exposed by a bizmcp server: the
//! [`BridgeClient`] speaks MCP to the server, the [`OpenRouterClient`] talks
//! to the model, and [`ChatSession`] runs the conversation between them.

pub mod bridge;
pub mod chat;
pub mod error;
pub mod llm;

pub use bridge::{BridgeClient, ToolInvoker, CLIENT_NAME};
pub use chat::{is_exit_command, ChatSession, AGENT_NAME, AGENT_VERSION};
pub use error::{ClientError, LlmError};
pub use llm::{
    ChatMessage, ChatModel, ModelReply, OpenRouterClient, OpenRouterConfig, Role,
    ToolCallRequest,
};
