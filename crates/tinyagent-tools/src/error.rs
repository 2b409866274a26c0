//! Error Types for Workspace Tools

use std::path::PathBuf;

use thiserror::Error;
use tinyagent_core::AgentError;

pub type Result<T> = std::result::Result<T, ToolError>;

/// Expected tool failures, reported back to the model as failed results
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Text not found in file")]
    TextNotFound,

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    #[error("Command failed with exit code {code}{}", stderr_suffix(.stderr))]
    CommandFailed { code: i32, stderr: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{}", stderr)
    }
}

impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        AgentError::ToolExecution(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_message() {
        let with_stderr = ToolError::CommandFailed {
            code: 2,
            stderr: "ls: cannot access 'nope'".into(),
        };
        assert_eq!(
            with_stderr.to_string(),
            "Command failed with exit code 2\nls: cannot access 'nope'"
        );

        let bare = ToolError::CommandFailed {
            code: 1,
            stderr: String::new(),
        };
        assert_eq!(bare.to_string(), "Command failed with exit code 1");
    }

    #[test]
    fn test_converts_to_agent_error() {
        let err: AgentError = ToolError::TextNotFound.into();
        assert!(matches!(err, AgentError::ToolExecution(ref msg) if msg == "Text not found in file"));
    }
}
