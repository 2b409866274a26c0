//! OpenAI Chat Completions Provider
//!
//! Works with the OpenAI API and any compatible server (MiniMax `/v1`,
//! Ollama's `/v1`, vLLM, ...).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tinyagent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, FinishReason, GenerationOptions, LlmProvider, TokenUsage},
    tool::{ToolCall, ToolDefinition, ToolFormat},
};

use crate::config::{ProviderConfig, ProviderKind};
use crate::http;

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
    /// Create a provider for `base_url` (up to, not including, `/chat/completions`)
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let config = ProviderConfig::new(ProviderKind::OpenAi, api_key).with_api_base(base_url);
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
        let wire_messages: Vec<Value> = messages.iter().map(Self::convert_message).collect();

        let mut body = json!({
            "model": options.model,
            "max_tokens": options.max_tokens,
            "messages": wire_messages,
        });
        if !tools.is_empty() {
            let wire_tools: Vec<Value> = tools.iter().map(|t| t.to_wire(ToolFormat::OpenAi)).collect();
            body["tools"] = json!(wire_tools);
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    /// Convert one agent message to OpenAI format
    fn convert_message(message: &Message) -> Value {
        match message.role {
            Role::System => json!({"role": "system", "content": message.content}),
            Role::User => json!({"role": "user", "content": message.content}),
            Role::Assistant if message.has_tool_calls() => {
                let calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {"name": call.name, "arguments": encode_arguments(&call.arguments)},
                        })
                    })
                    .collect();
                let content = (!message.content.is_empty()).then_some(message.content.as_str());
                json!({"role": "assistant", "content": content, "tool_calls": calls})
            }
            Role::Assistant => json!({"role": "assistant", "content": message.content}),
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id.as_deref().unwrap_or_default(),
                "name": message.name.as_deref().unwrap_or_default(),
                "content": message.content,
            }),
        }
    }

    /// Convert the API response to an agent completion
    fn convert_completion(response: ChatResponse) -> Result<Completion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Parse("openai: response has no choices".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolCall::new(call.id, call.function.name, decode_arguments(call.function.arguments)))
            .collect();

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            model: response.model,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_provider),
        })
    }
}

/// Arguments travel as a JSON-encoded string
fn encode_arguments(arguments: &Value) -> String {
    match arguments {
        // Undecodable arguments were kept verbatim
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Decode the argument string; malformed JSON is kept as a string so the
/// tool's validation reports it back to the model
fn decode_arguments(raw: String) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Tool call arguments are not valid JSON");
        Value::String(raw)
    })
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: String,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: String,
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::build_request(messages, tools, options);
        tracing::debug!(model = %options.model, messages = messages.len(), tools = tools.len(), "OpenAI request");

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);

        let response: ChatResponse = http::send_json(self.name(), request).await?;
        Self::convert_completion(response)
    }
}
