//! Tool catalog for the business bridge
//!
//! The five tools are fixed at startup. Each [`ToolSpec`] declares its
//! parameters once; the wire schema served by `tools/list` and the argument
//! check done before any downstream call are both derived from it.

use std::fmt;

use bizmcp_protocol::Tool;
use serde_json::{json, Map, Value};

/// Primitive JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Integer,
}

impl ParamKind {
    /// JSON Schema type name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared tool parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
}

impl ParamSpec {
    const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: true,
        }
    }

    const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
        }
    }
}

/// Argument bag rejected before reaching the downstream API
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgumentError {
    #[error("arguments must be a JSON object")]
    NotAnObject,

    #[error("missing required argument '{0}'")]
    Missing(&'static str),

    #[error("argument '{name}' must be of type {expected}")]
    WrongType {
        name: &'static str,
        expected: ParamKind,
    },

    #[error("{0}")]
    Decode(String),
}

/// Immutable description of one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    /// JSON Schema for the tool's input
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            properties.insert(
                param.name.to_string(),
                json!({
                    "type": param.kind.as_str(),
                    "description": param.description,
                }),
            );
        }

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Wire form served by `tools/list`
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// Check object shape, required presence and primitive types
    ///
    /// `null` is accepted as an empty argument bag. An optional parameter
    /// explicitly set to `null` counts as absent. Unknown keys are ignored.
    pub fn validate(&self, arguments: &Value) -> Result<(), ArgumentError> {
        let empty = Map::new();
        let args = match arguments {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => return Err(ArgumentError::NotAnObject),
        };

        for param in &self.params {
            match args.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ArgumentError::Missing(param.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.kind.accepts(value) => {
                    return Err(ArgumentError::WrongType {
                        name: param.name,
                        expected: param.kind,
                    });
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

/// The fixed, ordered tool catalog
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    catalog: Vec<Tool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        let specs = builtin_tools();
        let catalog = specs.iter().map(ToolSpec::to_tool).collect();
        Self { specs, catalog }
    }

    /// Specs in catalog order
    pub fn list(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Wire catalog, rendered once at construction
    pub fn catalog(&self) -> &[Tool] {
        &self.catalog
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.specs.iter().map(|spec| spec.name).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn builtin_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "register_agent",
            description: "Register a new agent with the business server",
            params: vec![
                ParamSpec::required("name", ParamKind::String, "Name of the agent to register"),
                ParamSpec::required("version", ParamKind::String, "Version of the agent"),
            ],
        },
        ToolSpec {
            name: "report_status",
            description: "Report agent status to the business server",
            params: vec![
                ParamSpec::required("agent_id", ParamKind::String, "ID of the agent reporting status"),
                ParamSpec::required("status", ParamKind::String, "Current status of the agent"),
                ParamSpec::optional("cpu_usage", ParamKind::Number, "CPU usage percentage (optional)"),
                ParamSpec::optional("memory_usage", ParamKind::Number, "Memory usage percentage (optional)"),
            ],
        },
        ToolSpec {
            name: "get_tasks",
            description: "Get tasks assigned to a specific agent",
            params: vec![ParamSpec::required(
                "agent_id",
                ParamKind::String,
                "ID of the agent to get tasks for",
            )],
        },
        ToolSpec {
            name: "add_number",
            description: "Add 1 to a given number using the business server",
            params: vec![ParamSpec::required(
                "number",
                ParamKind::Integer,
                "The number to add 1 to",
            )],
        },
        ToolSpec {
            name: "get_joke",
            description: "Get a random joke from the business server",
            params: vec![],
        },
    ]
}
