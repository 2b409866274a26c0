//! Provider Configuration
//!
//! Selects the wire protocol and endpoint for the hosted LLM.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tinyagent_core::error::{AgentError, Result};
use tinyagent_core::provider::LlmProvider;

use crate::anthropic::AnthropicProvider;
use crate::openai::OpenAiProvider;

/// Default API base (MiniMax, which speaks both protocols)
pub const DEFAULT_API_BASE: &str = "https://api.minimaxi.com";

/// Wire protocol spoken by the endpoint
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProviderKind {
    /// Anthropic Messages API
    #[default]
    Anthropic,
    /// OpenAI Chat Completions API (and compatible servers)
    OpenAi,
}

impl FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(AgentError::Config(format!(
                "Unknown provider '{}', expected 'anthropic' or 'openai'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Provider configuration
#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,

    /// Base URL as given; see [`ProviderConfig::base_url`] for the resolved one
    pub api_base: String,

    /// Transport timeout for one request
    pub timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.into(),
            timeout: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create from environment variables
    ///
    /// `TINYAGENT_API_KEY` is required; `TINYAGENT_PROVIDER` and
    /// `TINYAGENT_API_BASE` fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("TINYAGENT_API_KEY")
            .map_err(|_| AgentError::Config("TINYAGENT_API_KEY is not set".into()))?;
        let kind = match std::env::var("TINYAGENT_PROVIDER") {
            Ok(kind) => kind.parse()?,
            Err(_) => ProviderKind::default(),
        };

        let mut config = Self::new(kind, api_key);
        if let Ok(api_base) = std::env::var("TINYAGENT_API_BASE") {
            config.api_base = api_base;
        }
        Ok(config)
    }

    /// Resolved base URL
    ///
    /// MiniMax serves each protocol under its own prefix, so `/anthropic` or
    /// `/v1` is appended for MiniMax hosts.
    pub fn base_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        if !base.to_ascii_lowercase().contains("minimax") {
            return base.to_string();
        }

        let suffix = match self.kind {
            ProviderKind::Anthropic => "/anthropic",
            ProviderKind::OpenAi => "/v1",
        };
        if base.ends_with(suffix) {
            base.to_string()
        } else {
            format!("{}{}", base, suffix)
        }
    }
}

/// Build the provider selected by `config`
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    if config.api_key.trim().is_empty() {
        return Err(AgentError::Config("API key is empty".into()));
    }

    tracing::debug!(provider = %config.kind, base_url = %config.base_url(), "Building LLM provider");

    let provider: Arc<dyn LlmProvider> = match config.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(config)?),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(config)?),
    };
    Ok(provider)
}
