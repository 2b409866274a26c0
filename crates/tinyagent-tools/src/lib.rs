//! # tinyagent-tools
//!
//! Built-in tools that let the agent work inside a workspace directory.
//!
//! | Tool         | Purpose                                   |
//! |--------------|-------------------------------------------|
//! | `read_file`  | Read a file with line numbers             |
//! | `write_file` | Create or overwrite a file                |
//! | `edit_file`  | Exact text replacement in a file          |
//! | `bash`       | Run a shell command with a timeout        |
//!
//! Relative paths resolve against the workspace; absolute paths are used as
//! given.

pub mod bash;
pub mod error;
pub mod file;
pub mod workspace;

use tinyagent_core::ToolRegistry;

pub use bash::BashTool;
pub use error::{Result, ToolError};
pub use file::{EditFileTool, ReadFileTool, WriteFileTool};
pub use workspace::Workspace;

/// Registry holding every built-in tool, bound to `workspace`
pub fn default_tools(workspace: &Workspace) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ReadFileTool::new(workspace.clone()));
    registry.register(WriteFileTool::new(workspace.clone()));
    registry.register(EditFileTool::new(workspace.clone()));
    registry.register(BashTool::new(workspace.clone()));
    registry
}
