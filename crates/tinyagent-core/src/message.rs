//! Conversation Messages
//!
//! Standard message format used across the agent system, plus the
//! [`Conversation`] window that drives every LLM request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// Default token budget before the conversation is compacted
pub const DEFAULT_TOKEN_LIMIT: u32 = 80_000;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content (tool output or error text for tool messages)
    pub content: String,

    /// Tool invocations requested by the assistant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Originating call ID (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool name (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether the tool call failed (tool messages only)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,

    /// Synthetic summary produced by conversation compaction
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub summary: bool,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            is_error: false,
            summary: false,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message that requests tool calls
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a tool result message attributed to its originating call
    pub fn tool(result: &ToolResult) -> Self {
        let content = if result.success {
            result.content.clone()
        } else {
            format!("Error: {}", result.error.as_deref().unwrap_or("unknown error"))
        };

        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(result.call_id.clone());
        msg.name = Some(result.name.clone());
        msg.is_error = !result.success;
        msg
    }

    /// Create a compaction summary message
    pub fn summary(content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.summary = true;
        msg
    }

    /// Whether this assistant message requests tools
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> u32 {
        // ~4 characters per token is a rough estimate
        let call_chars: usize = self
            .tool_calls
            .iter()
            .map(|c| c.name.len() + c.arguments.to_string().len() + c.id.len())
            .sum();
        let chars = self.content.len() + call_chars;
        u32::try_from(chars / 4).unwrap_or(u32::MAX).saturating_add(4) // +4 for role overhead
    }
}

/// Conversation window with a token budget
///
/// The first message, when present, is always the system prompt. User messages
/// are never removed; assistant and tool messages may be replaced by a single
/// summary through [`Conversation::apply_summary`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,

    /// Maximum context length (in estimated tokens)
    #[serde(default = "default_token_limit")]
    token_limit: u32,
}

const fn default_token_limit() -> u32 {
    DEFAULT_TOKEN_LIMIT
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            token_limit: DEFAULT_TOKEN_LIMIT,
        }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.set_system_prompt(prompt);
        conv
    }

    /// Set the token budget
    #[must_use]
    pub const fn with_token_limit(mut self, token_limit: u32) -> Self {
        self.token_limit = token_limit;
        self
    }

    pub const fn token_limit(&self) -> u32 {
        self.token_limit
    }

    /// Install or replace the system prompt, keeping it at the front
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        let system = Message::system(prompt);
        match self.messages.first() {
            Some(first) if first.role == Role::System => self.messages[0] = system,
            _ => self.messages.insert(0, system),
        }
    }

    /// The system message, if any
    pub fn system(&self) -> Option<&Message> {
        self.messages.first().filter(|m| m.role == Role::System)
    }

    /// Add a message
    ///
    /// System messages only ever live at the front, so pushing one replaces
    /// the current system prompt.
    pub fn push(&mut self, message: Message) {
        if message.role == Role::System {
            self.set_system_prompt(message.content);
        } else {
            self.messages.push(message);
        }
    }

    /// Append all messages produced by one agent step
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            self.push(message);
        }
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// User messages in order
    pub fn user_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::User)
    }

    /// Clear all messages except system prompt
    pub fn clear_history(&mut self) {
        self.messages.retain(|m| m.role == Role::System);
    }

    /// Estimate total tokens in conversation
    pub fn estimate_tokens(&self) -> u32 {
        self.messages
            .iter()
            .map(Message::estimate_tokens)
            .fold(0u32, u32::saturating_add)
    }

    /// Whether the estimate is over budget
    pub fn exceeds_budget(&self) -> bool {
        self.estimate_tokens() > self.token_limit
    }

    /// True when the latest tool-calling assistant turn is still missing results
    pub fn has_pending_tool_calls(&self) -> bool {
        let Some(pos) = self
            .messages
            .iter()
            .rposition(|m| m.role == Role::Assistant && m.has_tool_calls())
        else {
            return false;
        };

        let answered: Vec<&str> = self.messages[pos + 1..]
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        self.messages[pos]
            .tool_calls
            .iter()
            .any(|call| !answered.contains(&call.id.as_str()))
    }

    /// Assistant and tool messages eligible for compaction
    pub fn compaction_candidates(&self) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| matches!(m.role, Role::Assistant | Role::Tool))
            .collect()
    }

    /// Replace every assistant/tool message with one summary message
    ///
    /// The summary lands right after the last user message (or after the
    /// system prompt when there is none). Returns how many messages were
    /// replaced.
    pub fn apply_summary(&mut self, summary: Message) -> usize {
        let before = self.messages.len();
        self.messages
            .retain(|m| !matches!(m.role, Role::Assistant | Role::Tool));
        let removed = before - self.messages.len();

        let insert_at = self
            .messages
            .iter()
            .rposition(|m| m.role == Role::User)
            .map_or_else(|| usize::from(self.system().is_some()), |pos| pos + 1);
        self.messages.insert(insert_at, summary);

        removed
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
