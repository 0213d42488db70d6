//! Conversation loop between the user, the model and the bridge

use bizmcp_protocol::Tool;
use serde_json::json;
use tracing::{error, info, warn};

use crate::bridge::ToolInvoker;
use crate::error::LlmError;
use crate::llm::{ChatMessage, ChatModel, ModelReply};

/// Agent identity registered with the business server at start-up
pub const AGENT_NAME: &str = "ChatBot";
pub const AGENT_VERSION: &str = "1.0.0";

const FOLLOW_UP_PROMPT: &str = "Please provide a helpful response based on the tool results above.";

/// Whether `input` ends the conversation
pub fn is_exit_command(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "quit" | "exit" | "bye")
}

/// One conversation: its transcript plus the model and tools it uses
pub struct ChatSession<M, T> {
    model: M,
    tools: T,
    history: Vec<ChatMessage>,
    agent_id: Option<String>,
}

impl<M: ChatModel, T: ToolInvoker> ChatSession<M, T> {
    /// Start a transcript seeded with a system prompt describing the catalog
    pub fn new(model: M, tools: T) -> Self {
        let system = system_prompt(tools.catalog());
        Self {
            model,
            tools,
            history: vec![ChatMessage::system(system)],
            agent_id: None,
        }
    }

    /// Register as an agent and remember the returned id
    pub async fn register(&mut self) -> Option<&str> {
        let result = self
            .tools
            .invoke(
                "register_agent",
                json!({"name": AGENT_NAME, "version": AGENT_VERSION}),
            )
            .await;
        info!("Agent registration result: {}", result);

        self.agent_id = parse_agent_id(&result);
        if self.agent_id.is_none() {
            warn!("Could not register agent");
        }
        self.agent_id.as_deref()
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    /// End the conversation and hand back the tool invoker
    pub fn into_tools(self) -> T {
        self.tools
    }

    /// Answer one user message
    ///
    /// Model failures come back as the reply text.
    pub async fn turn(&mut self, input: &str) -> String {
        self.history.push(ChatMessage::user(input));

        match self.respond().await {
            Ok(reply) => reply,
            Err(e) => {
                let message = format!("Error processing your request: {}", e);
                error!("{}", message);
                message
            }
        }
    }

    async fn respond(&mut self) -> Result<String, LlmError> {
        let calls = match self.model.complete(&self.history, self.tools.catalog()).await? {
            ModelReply::Text(text) => {
                self.history.push(ChatMessage::assistant(text.clone()));
                return Ok(text);
            }
            ModelReply::ToolCalls(calls) => calls,
        };

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            info!("Calling tool: {} with args: {}", call.name, call.arguments);
            let text = self.tools.invoke(&call.name, call.arguments).await;
            results.push(format!("Tool '{}' result: {}", call.name, text));
        }
        self.history.push(ChatMessage::assistant(format!(
            "I used some tools to help you. {}",
            results.join(" ")
        )));

        let mut follow_up = self.history.clone();
        follow_up.push(ChatMessage::user(FOLLOW_UP_PROMPT));

        let reply = match self.model.complete(&follow_up, &[]).await? {
            ModelReply::Text(text) => text,
            ModelReply::ToolCalls(calls) => {
                warn!(count = calls.len(), "Ignoring tool calls in follow-up completion");
                "No response from LLM".to_string()
            }
        };
        self.history.push(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }
}

fn system_prompt(catalog: &[Tool]) -> String {
    let listing: Vec<String> = catalog
        .iter()
        .map(|tool| format!("- {}: {}", tool.name, tool.description))
        .collect();

    format!(
        "You are a helpful assistant that can interact with a business server through various tools.\n\
         You have access to the following tools:\n\
         {}\n\n\
         When a user asks for something that can be accomplished with these tools, use the appropriate tool.\n\
         For example, if they ask for a joke, use the get_joke tool.\n\
         If they ask to add 1 to a number, use the add_number tool.\n\
         Be helpful and conversational in your responses.",
        listing.join("\n")
    )
}

fn parse_agent_id(registration: &str) -> Option<String> {
    let (_, id) = registration.split_once("Agent ID: ")?;
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Role, ToolCallRequest};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records what it was asked
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<ModelReply, LlmError>>>,
        seen: Mutex<Vec<(Vec<ChatMessage>, usize)>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<ModelReply, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, messages: &[ChatMessage], tools: &[Tool]) -> Result<ModelReply, LlmError> {
            self.seen.lock().unwrap().push((messages.to_vec(), tools.len()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ModelReply::Text("out of script".into())))
        }
    }

    struct RecordingTools {
        catalog: Vec<Tool>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingTools {
        fn new() -> Self {
            let tool = |name: &str, description: &str| Tool {
                name: name.into(),
                description: description.into(),
                input_schema: json!({"type": "object", "properties": {}, "required": []}),
            };
            Self {
                catalog: vec![
                    tool("register_agent", "Register a new agent with the business server"),
                    tool("add_number", "Add 1 to a given number using the business server"),
                    tool("get_joke", "Get a random joke from the business server"),
                ],
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolInvoker for RecordingTools {
        fn catalog(&self) -> &[Tool] {
            &self.catalog
        }

        async fn invoke(&self, name: &str, arguments: Value) -> String {
            self.calls.lock().unwrap().push((name.to_string(), arguments.clone()));
            match name {
                "register_agent" => "Agent registered successfully. Agent ID: 1234-abcd".into(),
                "add_number" => format!("Result: {} + 1 = {}", arguments["number"], arguments["number"].as_i64().unwrap_or(0) + 1),
                "get_joke" => "Here's a joke for you:\n\nSetup: A\nPunchline: B".into(),
                other => format!("Unknown tool: {}", other),
            }
        }
    }

    #[test]
    fn test_exit_commands() {
        assert!(is_exit_command("quit"));
        assert!(is_exit_command("  EXIT "));
        assert!(is_exit_command("Bye"));
        assert!(!is_exit_command("goodbye"));
        assert!(!is_exit_command(""));
    }

    #[test]
    fn test_parse_agent_id() {
        assert_eq!(
            parse_agent_id("Agent registered successfully. Agent ID: 42\n"),
            Some("42".to_string())
        );
        assert_eq!(parse_agent_id("Error executing register_agent: boom"), None);
        assert_eq!(parse_agent_id("Agent ID: "), None);
    }

    #[test]
    fn test_system_prompt_lists_catalog() {
        let session = ChatSession::new(ScriptedModel::new(vec![]), RecordingTools::new());
        let system = &session.history()[0];

        assert_eq!(system.role, Role::System);
        assert!(system.content.contains("- add_number: Add 1 to a given number"));
        assert!(system.content.contains("- get_joke: Get a random joke"));
    }

    #[tokio::test]
    async fn test_register_remembers_agent_id() {
        let mut session = ChatSession::new(ScriptedModel::new(vec![]), RecordingTools::new());
        assert_eq!(session.register().await, Some("1234-abcd"));
        assert_eq!(session.agent_id(), Some("1234-abcd"));

        let calls = session.tools().calls();
        assert_eq!(calls[0].1, json!({"name": "ChatBot", "version": "1.0.0"}));
    }

    #[tokio::test]
    async fn test_plain_text_turn() {
        let model = ScriptedModel::new(vec![Ok(ModelReply::Text("Hi there".into()))]);
        let mut session = ChatSession::new(model, RecordingTools::new());

        assert_eq!(session.turn("hello").await, "Hi there");
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.history()[2], ChatMessage::assistant("Hi there"));
        assert!(session.tools().calls().is_empty());
    }

    #[tokio::test]
    async fn test_tool_calls_run_in_order_then_follow_up() {
        let model = ScriptedModel::new(vec![
            Ok(ModelReply::ToolCalls(vec![
                ToolCallRequest {
                    name: "add_number".into(),
                    arguments: json!({"number": 41}),
                },
                ToolCallRequest {
                    name: "get_joke".into(),
                    arguments: json!({}),
                },
            ])),
            Ok(ModelReply::Text("42, and here is a joke".into())),
        ]);
        let mut session = ChatSession::new(model, RecordingTools::new());

        let reply = session.turn("add 1 to 41 and tell me a joke").await;
        assert_eq!(reply, "42, and here is a joke");

        let names: Vec<String> = session.tools().calls().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["add_number", "get_joke"]);

        // system, user, tool summary, final reply
        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[2].role, Role::Assistant);
        assert!(history[2]
            .content
            .starts_with("I used some tools to help you. Tool 'add_number' result: Result: 41 + 1 = 42 Tool 'get_joke' result:"));

        let seen = session.model.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        // First completion offers the catalog, the follow-up offers nothing
        assert_eq!(seen[0].1, 3);
        assert_eq!(seen[1].1, 0);
        let follow_up = seen[1].0.last().unwrap();
        assert_eq!(follow_up, &ChatMessage::user(FOLLOW_UP_PROMPT));
    }

    #[tokio::test]
    async fn test_model_failure_becomes_reply() {
        let model = ScriptedModel::new(vec![Err(LlmError::Status {
            status: 500,
            body: "upstream down".into(),
        })]);
        let mut session = ChatSession::new(model, RecordingTools::new());

        let reply = session.turn("hello").await;
        assert_eq!(
            reply,
            "Error processing your request: LLM returned HTTP 500: upstream down"
        );
        // The user message stays in the transcript
        assert_eq!(session.history().len(), 2);
    }
}
