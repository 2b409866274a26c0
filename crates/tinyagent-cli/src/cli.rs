//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;
use tinyagent_core::message::DEFAULT_TOKEN_LIMIT;
use tinyagent_core::reasoning::DEFAULT_MAX_STEPS;
use tinyagent_runtime::DEFAULT_API_BASE;

/// TinyAgent - Minimal AI Agent
#[derive(Debug, Parser)]
#[command(name = "tinyagent", version, about)]
pub struct Cli {
    /// Workspace directory (created if missing)
    #[arg(short, long, default_value = "./workspace")]
    pub workspace: PathBuf,

    /// API key for the LLM provider
    #[arg(long, env = "TINYAGENT_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Model name
    #[arg(long, default_value = "MiniMax-M2.5")]
    pub model: String,

    /// Wire protocol of the provider
    #[arg(long, env = "TINYAGENT_PROVIDER", default_value = "anthropic", value_parser = ["anthropic", "openai"])]
    pub provider: String,

    /// API base URL
    #[arg(long, env = "TINYAGENT_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Execute a single task and exit
    #[arg(short, long)]
    pub task: Option<String>,

    /// Directory of SKILL.md skills to expose to the agent
    #[arg(long)]
    pub skills_dir: Option<PathBuf>,

    /// Estimated-token budget before history is summarized
    #[arg(long, default_value_t = DEFAULT_TOKEN_LIMIT)]
    pub token_limit: u32,

    /// Maximum LLM calls per task
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,
}
