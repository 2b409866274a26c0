//! Shell Command Tool

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tinyagent_core::{
    Result as CoreResult, Tool, ToolCall, ToolDefinition, ToolResult,
    tool::ParameterSchema,
};
use tokio::process::Command;

use crate::error::{Result, ToolError};
use crate::workspace::Workspace;

/// Default timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Runs `sh -c <command>` inside the workspace
pub struct BashTool {
    workspace: Workspace,
}

impl BashTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    async fn run(&self, command: &str, timeout_secs: u64) -> Result<String> {
        tracing::debug!(command, timeout_secs, "Executing command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(self.workspace.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the timed-out future drops the child, which kills it
        let output = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout(timeout_secs))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(ToolError::CommandFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.into_owned(),
            });
        }

        if stdout.is_empty() {
            Ok("(no output)".into())
        } else {
            Ok(stdout.into_owned())
        }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "bash",
            "Execute bash commands in terminal. For terminal operations like git, npm, docker, etc. \
             DO NOT use for file operations.",
        )
        .param(ParameterSchema::required("command", "string", "The bash command to execute"))
        .param(
            ParameterSchema::optional("timeout", "integer", "Timeout in seconds (default: 120)")
                .with_default(json!(DEFAULT_TIMEOUT_SECS)),
        )
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let command = call.str_arg("command")?;
        let timeout_secs = call
            .argument("timeout")
            .and_then(Value::as_u64)
            .filter(|&t| t > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(match self.run(command, timeout_secs).await {
            Ok(output) => call.success(output),
            Err(e) => call.failure(e.to_string()),
        })
    }
}
