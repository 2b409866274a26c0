//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools are assembled into a [`ToolRegistry`] before the agent is built and
//! dispatched by name from the reasoning loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID assigned by the provider, echoed back with the result
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Arguments, normally a JSON object
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Look up a single argument
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key)
    }

    /// Required string argument
    pub fn str_arg(&self, key: &str) -> Result<&str> {
        self.argument(key)
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ToolValidation(format!("Missing string parameter: {}", key)))
    }

    /// Successful result attributed to this call
    pub fn success(&self, content: impl Into<String>) -> ToolResult {
        ToolResult::success(&self.id, &self.name, content)
    }

    /// Failed result attributed to this call
    pub fn failure(&self, error: impl Into<String>) -> ToolResult {
        ToolResult::failure(&self.id, &self.name, error)
    }
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Call ID of the originating request
    pub call_id: String,

    /// Tool that was called
    pub name: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Output on success
    #[serde(default)]
    pub content: String,

    /// Error text on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            success: true,
            content: content.into(),
            error: None,
        }
    }

    pub fn failure(
        call_id: impl Into<String>,
        name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            success: false,
            content: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, integer, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    /// Required parameter
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    /// Optional parameter
    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Wire shape of a tool definition for a provider's function-calling API
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolFormat {
    /// `{name, description, input_schema}`
    Anthropic,
    /// `{type: "function", function: {name, description, parameters}}`
    OpenAi,
}

/// Tool definition (for LLM function calling)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, param: ParameterSchema) -> Self {
        self.parameters.push(param);
        self
    }

    /// Names of required parameters in declaration order
    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// JSON Schema object describing the parameters
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(param.param_type));
            prop.insert("description".into(), json!(param.description));
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), json!(values));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required(),
        })
    }

    /// Serialize to a provider wire shape
    pub fn to_wire(&self, format: ToolFormat) -> Value {
        match format {
            ToolFormat::Anthropic => json!({
                "name": self.name,
                "description": self.description,
                "input_schema": self.json_schema(),
            }),
            ToolFormat::OpenAi => json!({
                "type": "function",
                "function": {
                    "name": self.name,
                    "description": self.description,
                    "parameters": self.json_schema(),
                },
            }),
        }
    }

    /// Parse a definition back from a provider wire shape
    pub fn from_wire(format: ToolFormat, value: &Value) -> Result<Self> {
        let (body, schema_key) = match format {
            ToolFormat::Anthropic => (value, "input_schema"),
            ToolFormat::OpenAi => (
                value
                    .get("function")
                    .ok_or_else(|| AgentError::Parse("Missing 'function' object".into()))?,
                "parameters",
            ),
        };

        let name = body
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Parse("Tool definition without a name".into()))?;
        let description = body
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let schema = body.get(schema_key).cloned().unwrap_or_else(|| json!({}));

        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut definition = Self::new(name, description);
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (param_name, prop) in properties {
                let str_field = |key: &str| {
                    prop.get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                definition.parameters.push(ParameterSchema {
                    name: param_name.clone(),
                    param_type: str_field("type"),
                    description: str_field("description"),
                    required: required.contains(&param_name.as_str()),
                    default: prop.get("default").cloned(),
                    enum_values: prop.get("enum").and_then(Value::as_array).cloned(),
                });
            }
        }

        Ok(definition)
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's definition for LLM function calling
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Validate arguments before execution (optional)
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let Some(arguments) = call.arguments.as_object() else {
            return Err(AgentError::ToolValidation(format!(
                "Arguments for '{}' must be a JSON object",
                call.name
            )));
        };

        for param in self.definition().parameters {
            if param.required && !arguments.contains_key(&param.name) {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Ordered registry of available tools
///
/// Read-only once handed to an agent, so it can be shared between sessions.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool; a tool with the same name is replaced in place
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        if let Some(&pos) = self.index.get(&name) {
            tracing::warn!(tool = %name, "Replacing previously registered tool");
            self.tools[pos] = tool;
        } else {
            self.index.insert(name, self.tools.len());
            self.tools.push(tool);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&pos| self.tools[pos].clone())
    }

    /// Execute a tool call, surfacing lookup and validation errors
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self.get(&call.name).ok_or_else(|| AgentError::UnknownTool {
            name: call.name.clone(),
            available: self.names().into_iter().map(String::from).collect(),
        })?;

        // Validate first
        tool.validate(call)?;

        tool.execute(call).await
    }

    /// Execute a tool call, converting every failure into a failed result
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        tracing::debug!(tool = %call.name, call_id = %call.id, "Dispatching tool call");

        let mut result = match self.execute(call).await {
            Ok(result) => result,
            Err(AgentError::UnknownTool { name, available }) => call.failure(format!(
                "Unknown tool: {}. Available tools: {}",
                name,
                available.join(", ")
            )),
            Err(e) => call.failure(e.to_string()),
        };

        // Attribution always follows the request, whatever the tool filled in
        result.call_id.clone_from(&call.id);
        result.name.clone_from(&call.name);

        if !result.success {
            tracing::warn!(
                tool = %call.name,
                error = result.error.as_deref().unwrap_or_default(),
                "Tool call failed"
            );
        }

        result
    }

    /// All tool definitions in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<(&str, usize)> =
            self.index.iter().map(|(n, &pos)| (n.as_str(), pos)).collect();
        names.sort_by_key(|&(_, pos)| pos);
        names.into_iter().map(|(n, _)| n).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
