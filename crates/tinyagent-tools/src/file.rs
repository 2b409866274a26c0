//! File Tools
//!
//! `read_file`, `write_file` and `edit_file`, resolving relative paths
//! against the workspace.

use async_trait::async_trait;
use tinyagent_core::{
    Result as CoreResult, Tool, ToolCall, ToolDefinition, ToolResult,
    tool::ParameterSchema,
};

use crate::error::{Result, ToolError};
use crate::workspace::Workspace;

const PATH_DESCRIPTION: &str = "Absolute or relative path to the file";

/// Map a missing file to `FileNotFound` with the path the model asked for
fn not_found(path: &str) -> impl FnOnce(std::io::Error) -> ToolError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolError::FileNotFound(path.into())
        } else {
            ToolError::Io(e)
        }
    }
}

/// Reads a file with line numbers
pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    async fn read(&self, path: &str) -> Result<String> {
        let content = tokio::fs::read_to_string(self.workspace.resolve(path))
            .await
            .map_err(not_found(path))?;
        Ok(number_lines(&content))
    }
}

/// `{line:6}|{text}` per line, trailing whitespace trimmed
fn number_lines(content: &str) -> String {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:6}|{}", i + 1, line.trim_end()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "read_file",
            "Read file contents from the filesystem. Output includes line numbers.",
        )
        .param(ParameterSchema::required("path", "string", PATH_DESCRIPTION))
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let path = call.str_arg("path")?;
        Ok(match self.read(path).await {
            Ok(content) => call.success(content),
            Err(e) => call.failure(e.to_string()),
        })
    }
}

/// Writes (overwrites) a file, creating parent directories
pub struct WriteFileTool {
    workspace: Workspace,
}

impl WriteFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    async fn write(&self, path: &str, content: &str) -> Result<String> {
        let file_path = self.workspace.resolve(path);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file_path, content).await?;

        tracing::debug!(path = %file_path.display(), bytes = content.len(), "Wrote file");
        Ok(format!("Successfully wrote to {}", file_path.display()))
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "write_file",
            "Write content to a file. Will overwrite existing files completely.",
        )
        .param(ParameterSchema::required("path", "string", PATH_DESCRIPTION))
        .param(ParameterSchema::required("content", "string", "Complete content to write"))
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let path = call.str_arg("path")?;
        let content = call.str_arg("content")?;
        Ok(match self.write(path, content).await {
            Ok(message) => call.success(message),
            Err(e) => call.failure(e.to_string()),
        })
    }
}

/// Replaces exact text in a file
pub struct EditFileTool {
    workspace: Workspace,
}

impl EditFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    async fn edit(&self, path: &str, old_str: &str, new_str: &str) -> Result<String> {
        let file_path = self.workspace.resolve(path);
        let content = tokio::fs::read_to_string(&file_path)
            .await
            .map_err(not_found(path))?;

        if old_str.is_empty() || !content.contains(old_str) {
            return Err(ToolError::TextNotFound);
        }

        tokio::fs::write(&file_path, content.replace(old_str, new_str)).await?;
        Ok(format!("Successfully edited {}", file_path.display()))
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("edit_file", "Perform exact string replacement in a file.")
            .param(ParameterSchema::required("path", "string", PATH_DESCRIPTION))
            .param(ParameterSchema::required("old_str", "string", "Exact string to find and replace"))
            .param(ParameterSchema::required("new_str", "string", "Replacement string"))
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let path = call.str_arg("path")?;
        let old_str = call.str_arg("old_str")?;
        let new_str = call.str_arg("new_str")?;
        Ok(match self.edit(path, old_str, new_str).await {
            Ok(message) => call.success(message),
            Err(e) => call.failure(e.to_string()),
        })
    }
}
