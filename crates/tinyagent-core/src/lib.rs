//! # tinyagent-core
//!
//! Core agent logic with provider-agnostic LLM abstraction and extensible tool system.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Agent                                │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  Reasoning  │  │    Tools    │  │   LlmProvider       │  │
//! │  │    Loop     │──│   Registry  │──│   (Strategy)        │  │
//! │  └──────┬──────┘  └──────┬──────┘  └─────────────────────┘  │
//! │  ┌──────┴──────┐  ┌──────┴──────┐                           │
//! │  │   Memory    │  │   Skills    │                           │
//! │  │ (compaction)│  │  (SKILL.md) │                           │
//! │  └─────────────┘  └─────────────┘                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Anthropic, OpenAI, or any
//! OpenAI-compatible endpoint without changing agent logic.

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod skill;
pub mod tool;

#[cfg(test)]
mod testing;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{Completion, FinishReason, GenerationOptions, LlmProvider, TokenUsage};
pub use reasoning::{Agent, AgentBuilder, AgentConfig};
pub use session::{Session, SessionId};
pub use skill::{SkillLoader, SkillMetadata};
pub use tool::{ParameterSchema, Tool, ToolCall, ToolDefinition, ToolFormat, ToolRegistry, ToolResult};
