//! tinyagent command-line interface
//!
//! Runs one task with `--task`, otherwise reads tasks from stdin until
//! `exit`. Answers go to stdout; logs go to stderr.

mod cli;

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tinyagent_core::{Agent, Session};
use tinyagent_runtime::{ProviderConfig, ProviderKind, build_provider};
use tinyagent_tools::{Workspace, default_tools};

use crate::cli::Cli;

const SYSTEM_PROMPT: &str = "You are TinyAgent, an AI assistant that can help users complete tasks.

You have access to tools to:
- read_file: Read file contents
- write_file: Write content to files
- edit_file: Edit files by replacing text
- bash: Execute shell commands

Use these tools to help users with their tasks.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn,tinyagent=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let workspace = Workspace::create(&cli.workspace)
        .with_context(|| format!("Failed to create workspace {}", cli.workspace.display()))?;

    let kind: ProviderKind = cli.provider.parse()?;
    let provider_config = ProviderConfig::new(kind, &cli.api_key).with_api_base(&cli.api_base);
    let provider = build_provider(&provider_config).context("Failed to initialize LLM provider")?;

    let tools = default_tools(&workspace);
    tracing::info!(tools = ?tools.names(), workspace = %workspace.root().display(), "Registered tools");

    let mut builder = Agent::builder()
        .provider(provider)
        .tools(tools)
        .system_prompt(format!("{}\n\n{}", SYSTEM_PROMPT, workspace.prompt_section()))
        .model(&cli.model)
        .token_limit(cli.token_limit)
        .max_steps(cli.max_steps);
    if let Some(dir) = &cli.skills_dir {
        builder = builder.skills_dir(dir);
    }
    let agent = Arc::new(builder.build()?);

    if let Some(skills) = agent.skills() {
        tracing::info!(count = skills.len(), skills = ?skills.names(), "Loaded skills");
    }

    let mut session = agent.session();
    tracing::debug!(session = %session.id, "Session started");

    match cli.task {
        Some(task) => {
            // Non-interactive mode: execute single task
            println!("Executing task: {}\n", task);
            match session.run(&task).await {
                Ok(result) => println!("\n=== Final Result ===\n{}", result),
                Err(e) => {
                    tracing::debug!(error = ?e, "Task failed");
                    anyhow::bail!("Task failed: {}", e.user_message());
                }
            }
        }
        None => interactive(&mut session).await?,
    }

    Ok(())
}

/// Read tasks from stdin until `exit`, `quit`, `q` or end of input
async fn interactive(session: &mut Session) -> anyhow::Result<()> {
    println!("TinyAgent - Interactive Mode");
    println!("Type 'exit' to quit\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You › ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\nGoodbye!");
            break;
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit" | "q") {
            tracing::info!(session = %session.id, title = %session.title(), messages = session.message_count(), "Session ended");
            println!("Goodbye!");
            break;
        }

        // Ctrl-C abandons the current task; the conversation keeps only
        // the steps that finished before it
        tokio::select! {
            result = session.run(input) => match result {
                Ok(answer) => println!("\n=== Result ===\n{}\n", answer),
                Err(e) => {
                    tracing::debug!(error = ?e, "Task failed");
                    println!("Error: {}\n", e.user_message());
                }
            },
            _ = tokio::signal::ctrl_c() => println!("\nInterrupted.\n"),
        }
    }

    Ok(())
}
