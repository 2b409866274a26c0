//! Workspace directory shared by the built-in tools

use std::path::{Path, PathBuf};

/// Directory that relative tool paths and shell commands are anchored to
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    /// Create the directory if needed
    pub fn create(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let workspace = Self::new(root);
        std::fs::create_dir_all(&workspace.root)?;
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute paths pass through; relative ones are joined to the root
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// System prompt section telling the model where it works
    pub fn prompt_section(&self) -> String {
        format!("## Current Workspace\n`{}`", self.root.display())
    }
}
