//! Anthropic Messages Provider
//!
//! Implementation of `LlmProvider` for the Anthropic Messages API and
//! compatible endpoints (MiniMax serves one under `/anthropic`).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tinyagent_core::{
    error::Result,
    message::{Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, TokenUsage},
    tool::{ToolCall, ToolDefinition, ToolFormat},
};

use crate::config::{ProviderConfig, ProviderKind};
use crate::http;

const API_VERSION: &str = "2023-06-01";

/// Sent when the history ends on an assistant turn, which the API would
/// otherwise treat as a prefill to continue
const CONTINUE_PROMPT: &str = "Continue with the task.";

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AnthropicProvider {
    /// Create a provider for `base_url` (without the `/v1/messages` path)
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let config = ProviderConfig::new(ProviderKind::Anthropic, api_key).with_api_base(base_url);
        Self::from_config(&config)
    }

    /// Create from configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout)?,
            base_url: config.base_url(),
            api_key: config.api_key.clone(),
        })
    }

    /// Build the request body
    fn build_request(messages: &[Message], tools: &[ToolDefinition], options: &GenerationOptions) -> Value {
        let (system, wire_messages) = Self::convert_messages(messages);

        let mut body = json!({
            "model": options.model,
            "max_tokens": options.max_tokens,
            "messages": wire_messages,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        if !tools.is_empty() {
            let wire_tools: Vec<Value> = tools.iter().map(|t| t.to_wire(ToolFormat::Anthropic)).collect();
            body["tools"] = json!(wire_tools);
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    /// Convert agent messages to Anthropic format
    ///
    /// System messages are hoisted out of the list. Tool results become
    /// `tool_result` blocks in a user message; consecutive results share one.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut system = Vec::new();
        let mut wire: Vec<Value> = Vec::with_capacity(messages.len());

        for message in messages {
            match message.role {
                Role::System => system.push(message.content.as_str()),
                Role::User => wire.push(json!({"role": "user", "content": message.content})),
                Role::Assistant if message.has_tool_calls() => {
                    let mut blocks = Vec::with_capacity(message.tool_calls.len() + 1);
                    if !message.content.is_empty() {
                        blocks.push(json!({"type": "text", "text": message.content}));
                    }
                    for call in &message.tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": tool_input(&call.arguments),
                        }));
                    }
                    wire.push(json!({"role": "assistant", "content": blocks}));
                }
                Role::Assistant => wire.push(json!({"role": "assistant", "content": message.content})),
                Role::Tool => {
                    let block = json!({
                        "type": "tool_result",
                        "tool_use_id": message.tool_call_id.as_deref().unwrap_or_default(),
                        "content": message.content,
                        "is_error": message.is_error,
                    });
                    match wire.last_mut().and_then(tool_result_blocks) {
                        Some(blocks) => blocks.push(block),
                        None => wire.push(json!({"role": "user", "content": [block]})),
                    }
                }
            }
        }

        if wire.last().is_some_and(|m| m["role"] == "assistant") {
            wire.push(json!({"role": "user", "content": CONTINUE_PROMPT}));
        }

        let system = (!system.is_empty()).then(|| system.join("\n\n"));
        (system, wire)
    }

    /// Convert the API response to an agent completion
    fn convert_completion(response: MessagesResponse) -> Completion {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text } => content.push_str(&text),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall::new(id, name, input)),
                ContentBlock::Other => {}
            }
        }

        Completion {
            content,
            tool_calls,
            model: response.model,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens.saturating_add(u.output_tokens),
            }),
            finish_reason: response.stop_reason.as_deref().map(FinishReason::from_provider),
        }
    }
}

/// The API requires `input` to be an object
fn tool_input(arguments: &Value) -> Value {
    if arguments.is_object() {
        arguments.clone()
    } else {
        json!({})
    }
}

/// The content blocks of a user message holding only tool results
fn tool_result_blocks(message: &mut Value) -> Option<&mut Vec<Value>> {
    if message["role"] != "user" {
        return None;
    }
    let blocks = message.get_mut("content")?.as_array_mut()?;
    blocks
        .iter()
        .all(|b| b["type"] == "tool_result")
        .then_some(blocks)
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: String,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    /// Thinking and other block types carry nothing the agent uses
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::build_request(messages, tools, options);
        tracing::debug!(model = %options.model, messages = messages.len(), tools = tools.len(), "Anthropic request");

        let request = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body);

        let response: MessagesResponse = http::send_json(self.name(), request).await?;
        Ok(Self::convert_completion(response))
    }
}
