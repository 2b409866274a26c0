//! # tinyagent-runtime
//!
//! Hosted LLM providers for tinyagent.
//!
//! ## Providers
//!
//! - **Anthropic** (default): Anthropic Messages API, also served by MiniMax
//! - **OpenAI**: Chat Completions API and compatible servers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tinyagent_runtime::{ProviderConfig, build_provider};
//!
//! let provider = build_provider(&ProviderConfig::from_env()?)?;
//! let agent = AgentBuilder::new()
//!     .provider(provider)
//!     .build()?;
//! ```

pub mod anthropic;
pub mod config;
mod http;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use config::{DEFAULT_API_BASE, ProviderConfig, ProviderKind, build_provider};
pub use openai::OpenAiProvider;

// Re-export core types for convenience
pub use tinyagent_core::{
    Agent, AgentBuilder, AgentError, LlmProvider, Message, Result, Role, Session, Tool, ToolRegistry,
};
