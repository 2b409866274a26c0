//! Skills with progressive disclosure
//!
//! - Level 1: name + description, always in the system prompt
//! - Level 2: full `SKILL.md` body, fetched on demand with `get_skill`
//! - Level 3: resources the body points at, rewritten to absolute paths
//!
//! Bodies are rewritten once on first request and cached by name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use async_trait::async_trait;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{AgentError, Result};
use crate::tool::{ParameterSchema, Tool, ToolCall, ToolDefinition, ToolResult};

pub const SKILL_FILENAME: &str = "SKILL.md";

static FRONT_MATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)(.*)\z")
        .expect("front matter pattern is valid")
});

// `python scripts/run.py` or `scripts/run.py` in backticks
static RESOURCE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(python3?\s+|`)((?:scripts|references|assets)/[^\s`)]+)")
        .expect("resource pattern is valid")
});

// [text](target)
static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("link pattern is valid")
});

/// Level 1 metadata parsed from the front matter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMetadata {
    pub name: String,
    pub description: String,
}

/// A discovered skill
#[derive(Clone, Debug)]
pub struct Skill {
    pub metadata: SkillMetadata,

    /// Directory containing `SKILL.md`; anchor for relative resources
    pub dir: PathBuf,

    /// Body after the front matter, as written
    pub body: String,
}

impl Skill {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Parse a `SKILL.md` file
pub fn parse_skill_file(path: &Path) -> Result<Skill> {
    let content = std::fs::read_to_string(path)?;

    let caps = FRONT_MATTER.captures(&content).ok_or_else(|| {
        AgentError::Skill(format!("Missing YAML front matter in {}", path.display()))
    })?;

    let metadata: SkillMetadata = serde_yaml::from_str(&caps[1])
        .map_err(|e| AgentError::Skill(format!("Invalid front matter in {}: {}", path.display(), e)))?;

    if metadata.name.trim().is_empty() {
        return Err(AgentError::Skill(format!(
            "Skill 'name' cannot be empty in {}",
            path.display()
        )));
    }
    if metadata.description.trim().is_empty() {
        return Err(AgentError::Skill(format!(
            "Skill 'description' cannot be empty in {}",
            path.display()
        )));
    }

    let dir = path
        .parent()
        .ok_or_else(|| AgentError::Skill(format!("Cannot determine skill directory of {}", path.display())))?
        .to_path_buf();

    Ok(Skill {
        metadata: SkillMetadata {
            name: metadata.name.trim().to_string(),
            description: metadata.description.trim().to_string(),
        },
        dir,
        body: caps[2].trim().to_string(),
    })
}

/// Rewrite relative resource references to absolute paths under `skill_dir`
///
/// Only references to files that exist are rewritten. Already-absolute
/// references are left alone, so applying this twice is the same as once.
pub fn rewrite_resource_paths(content: &str, skill_dir: &Path) -> String {
    let content = RESOURCE_REF.replace_all(content, |caps: &Captures| {
        let abs = skill_dir.join(&caps[2]);
        if abs.exists() {
            format!("{}{}", &caps[1], abs.display())
        } else {
            caps[0].to_string()
        }
    });

    MARKDOWN_LINK
        .replace_all(&content, |caps: &Captures| {
            let target = &caps[2];
            if target.starts_with(['`', '/', '#'])
                || target.contains("://")
                || Path::new(target).is_absolute()
            {
                return caps[0].to_string();
            }

            let abs = skill_dir.join(target.strip_prefix("./").unwrap_or(target));
            if abs.exists() {
                format!("[{}]({})", &caps[1], abs.display())
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Discovers skills under a root directory and serves their content lazily
pub struct SkillLoader {
    root: PathBuf,
    skills: Vec<Skill>,
    index: HashMap<String, usize>,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl SkillLoader {
    /// A relative root is anchored at the current directory so rewritten
    /// resource paths stay valid from any working directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            root: std::path::absolute(&root).unwrap_or(root),
            skills: Vec::new(),
            index: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create a loader and run discovery
    pub fn discover_in(root: impl Into<PathBuf>) -> Self {
        let mut loader = Self::new(root);
        loader.discover();
        loader
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the root for `SKILL.md` files and load their metadata
    ///
    /// A file that fails to parse is skipped with a warning; a duplicate name
    /// keeps the first skill found.
    pub fn discover(&mut self) -> Vec<SkillMetadata> {
        self.skills.clear();
        self.index.clear();
        self.clear_cache();

        if !self.root.is_dir() {
            tracing::warn!(root = %self.root.display(), "Skills directory does not exist");
            return Vec::new();
        }

        for entry in WalkDir::new(&self.root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", self.root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || entry.file_name() != SKILL_FILENAME {
                continue;
            }

            match parse_skill_file(entry.path()) {
                Ok(skill) => {
                    if self.index.contains_key(skill.name()) {
                        tracing::warn!(
                            skill = %skill.name(),
                            path = %entry.path().display(),
                            "Duplicate skill name, ignoring"
                        );
                        continue;
                    }
                    tracing::debug!(skill = %skill.name(), path = %entry.path().display(), "Discovered skill");
                    self.index.insert(skill.name().to_string(), self.skills.len());
                    self.skills.push(skill);
                }
                Err(e) => {
                    tracing::warn!("Failed to load skill at {}: {}", entry.path().display(), e);
                }
            }
        }

        tracing::info!(count = self.skills.len(), "Skills loaded");
        self.metadata().cloned().collect()
    }

    /// Level 1 metadata in discovery order
    pub fn metadata(&self) -> impl Iterator<Item = &SkillMetadata> {
        self.skills.iter().map(|s| &s.metadata)
    }

    /// Skill names in discovery order
    pub fn names(&self) -> Vec<String> {
        self.skills.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn skill(&self, name: &str) -> Option<&Skill> {
        self.index.get(name).map(|&pos| &self.skills[pos])
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Level 2 content with resource paths rewritten; cached after first call
    pub fn get(&self, name: &str) -> Result<Arc<str>> {
        if let Some(content) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(content));
        }

        let skill = self.skill(name).ok_or_else(|| AgentError::SkillNotFound {
            name: name.to_string(),
            available: self.names(),
        })?;

        let content: Arc<str> = rewrite_resource_paths(&skill.body, &skill.dir).into();
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&content));

        Ok(content)
    }

    /// Full prompt block returned to the model by `get_skill`
    pub fn prompt(&self, name: &str) -> Result<String> {
        let content = self.get(name)?;
        let dir = self
            .skill(name)
            .map_or_else(|| "unknown".to_string(), |s| s.dir.display().to_string());

        Ok(format!(
            "# Skill: {}\n\n**Skill Root Directory:** `{}`\n\n---\n\n{}\n",
            name, dir, content
        ))
    }

    /// Whether a skill's content is already cached
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Drop one cached body so the next `get` rebuilds it
    pub fn invalidate(&self, name: &str) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Level 1 section for the system prompt; empty when no skills are loaded
    pub fn metadata_prompt(&self) -> String {
        if self.skills.is_empty() {
            return String::new();
        }

        let mut lines = vec![
            "## Available Skills\n".to_string(),
            "You have access to specialized skills. Each skill provides expert guidance for specific tasks.\n"
                .to_string(),
            "Load a skill's full content using the get_skill tool when needed.\n".to_string(),
        ];
        lines.extend(
            self.metadata()
                .map(|m| format!("- `{}`: {}", m.name, m.description)),
        );
        lines.join("\n")
    }
}

/// Loads a skill's full content on demand
pub struct GetSkillTool {
    loader: Arc<SkillLoader>,
}

impl GetSkillTool {
    pub fn new(loader: Arc<SkillLoader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Tool for GetSkillTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_skill",
            "Get complete content and guidance for a specified skill. Use this when you need detailed information about a specific skill.",
        )
        .param(ParameterSchema::required(
            "skill_name",
            "string",
            "Name of the skill to retrieve",
        ))
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let name = call.str_arg("skill_name")?;
        match self.loader.prompt(name) {
            Ok(prompt) => Ok(call.success(prompt)),
            Err(e @ AgentError::SkillNotFound { .. }) => Ok(call.failure(e.to_string())),
            Err(e) => Err(e),
        }
    }
}

/// Lists Level 1 metadata of every skill
pub struct ListSkillsTool {
    loader: Arc<SkillLoader>,
}

impl ListSkillsTool {
    pub fn new(loader: Arc<SkillLoader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Tool for ListSkillsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("list_skills", "List all available skills with their descriptions.")
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        if self.loader.is_empty() {
            return Ok(call.success("No skills available."));
        }

        let mut lines = vec!["Available Skills:\n".to_string()];
        lines.extend(
            self.loader
                .metadata()
                .map(|m| format!("- `{}`: {}", m.name, m.description)),
        );
        Ok(call.success(lines.join("\n")))
    }
}
