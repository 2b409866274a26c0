//! Reasoning Loop
//!
//! Drives the tool-calling loop: send the conversation to the provider,
//! dispatch any requested tools in order, feed the results back, and stop at
//! the first response without tool calls.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::memory::{self, Compression};
use crate::message::{Conversation, DEFAULT_TOKEN_LIMIT, Message};
use crate::provider::{Completion, GenerationOptions, LlmProvider};
use crate::session::Session;
use crate::skill::{GetSkillTool, ListSkillsTool, SkillLoader};
use crate::tool::{Tool, ToolDefinition, ToolRegistry};

/// Default step limit for one `run`
pub const DEFAULT_MAX_STEPS: usize = 50;

const DEFAULT_SYSTEM_PROMPT: &str = "You are TinyAgent, an AI assistant that can help users complete tasks.

Use the tools available to you when they help. When the task is complete, reply with the final answer without calling any tool.";

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Base system prompt (skill metadata is appended when skills are loaded)
    pub system_prompt: String,

    /// Maximum LLM calls per `run` before giving up
    pub max_steps: usize,

    /// Estimated-token budget that triggers conversation compaction
    pub token_limit: u32,

    /// Generation options
    pub generation: GenerationOptions,

    /// Extra attempts for retryable provider errors (0 = fail fast)
    pub provider_retries: u32,

    /// Delay before the first retry; doubles on each further attempt
    pub retry_backoff: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_steps: DEFAULT_MAX_STEPS,
            token_limit: DEFAULT_TOKEN_LIMIT,
            generation: GenerationOptions::default(),
            provider_retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// The main Agent struct
///
/// Holds only read-only state, so one `Arc<Agent>` can serve many
/// conversations at once.
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    definitions: Vec<ToolDefinition>,
    skills: Option<Arc<SkillLoader>>,
    system_prompt: String,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            definitions: tools.definitions(),
            system_prompt: config.system_prompt.clone(),
            provider,
            tools,
            skills: None,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Full system prompt, including skill metadata
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Fresh conversation seeded with the system prompt and token budget
    pub fn new_conversation(&self) -> Conversation {
        Conversation::with_system_prompt(&self.system_prompt).with_token_limit(self.config.token_limit)
    }

    /// Run the agent on one user message
    ///
    /// Each step's assistant and tool messages are appended together once the
    /// step finishes, so dropping this future between or during steps never
    /// leaves half a step in the conversation.
    pub async fn run(&self, conversation: &mut Conversation, user_text: &str) -> Result<String> {
        // Ensure system prompt is set
        if conversation.system().is_none() {
            conversation.set_system_prompt(&self.system_prompt);
        }
        conversation.push(Message::user(user_text));

        for step in 1..=self.config.max_steps {
            tracing::debug!(step, max_steps = self.config.max_steps, "Agent step");

            let compression =
                memory::maybe_compress(conversation, self.provider.as_ref(), &self.config.generation).await?;
            if let Compression::Compressed { replaced, .. } = compression {
                tracing::debug!(step, replaced, "Compacted history before LLM call");
            }

            let completion = self.generate(conversation.messages()).await?;

            // No tool call - this is the final response
            if completion.is_final() {
                conversation.push(Message::assistant(&completion.content));
                tracing::info!(steps = step, "Agent run complete");
                return Ok(completion.content);
            }

            let step_messages = self.execute_tool_calls(completion).await;
            conversation.extend(step_messages);
        }

        tracing::warn!(max_steps = self.config.max_steps, "Step limit reached");
        Err(AgentError::StepLimitExceeded(self.config.max_steps))
    }

    /// Run with a simple string input (creates temporary conversation)
    pub async fn ask(&self, question: &str) -> Result<String> {
        let mut conversation = self.new_conversation();
        self.run(&mut conversation, question).await
    }

    /// Start a session that owns its own conversation
    pub fn session(self: &Arc<Self>) -> Session {
        Session::new(Arc::clone(self))
    }

    /// Dispatch every requested call in order and build the step's messages
    async fn execute_tool_calls(&self, completion: Completion) -> Vec<Message> {
        let Completion {
            content,
            mut tool_calls,
            ..
        } = completion;

        // IDs attribute results to calls and must be unique across the
        // whole conversation; fill any the provider left blank
        for call in tool_calls.iter_mut().filter(|c| c.id.is_empty()) {
            call.id = format!("call_{}", Uuid::new_v4().simple());
        }

        let mut messages = Vec::with_capacity(tool_calls.len() + 1);
        let mut results = Vec::with_capacity(tool_calls.len());
        for call in &tool_calls {
            tracing::debug!(tool = %call.name, arguments = %call.arguments, "Executing tool");
            let result = self.tools.dispatch(call).await;
            results.push(Message::tool(&result));
        }

        messages.push(Message::assistant_with_tools(content, tool_calls));
        messages.extend(results);
        messages
    }

    /// Call the provider, retrying retryable failures per configuration
    async fn generate(&self, messages: &[Message]) -> Result<Completion> {
        let mut attempt = 0;
        loop {
            match self
                .provider
                .generate(messages, &self.definitions, &self.config.generation)
                .await
            {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() && attempt < self.config.provider_retries => {
                    let delay = self.config.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    tracing::warn!(
                        provider = self.provider.name(),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Retrying provider call: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Skill loader, when a skills directory was configured
    pub fn skills(&self) -> Option<&SkillLoader> {
        self.skills.as_deref()
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    skills_dir: Option<PathBuf>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            skills_dir: None,
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    /// Discover skills here and expose them through `get_skill`/`list_skills`
    #[must_use]
    pub fn skills_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skills_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn token_limit(mut self, limit: u32) -> Self {
        self.config.token_limit = limit;
        self
    }

    #[must_use]
    pub const fn max_steps(mut self, max: usize) -> Self {
        self.config.max_steps = max;
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub const fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = Some(temp);
        self
    }

    #[must_use]
    pub const fn provider_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.config.provider_retries = retries;
        self.config.retry_backoff = backoff;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        if self.config.max_steps == 0 {
            return Err(AgentError::Config("max_steps must be at least 1".into()));
        }

        let mut tools = self.tools;
        let mut system_prompt = self.config.system_prompt.clone();

        let skills = self.skills_dir.map(|dir| {
            let loader = Arc::new(SkillLoader::discover_in(dir));
            if !loader.is_empty() {
                system_prompt.push_str("\n\n");
                system_prompt.push_str(&loader.metadata_prompt());
            }
            tools.register(GetSkillTool::new(Arc::clone(&loader)));
            tools.register(ListSkillsTool::new(Arc::clone(&loader)));
            loader
        });

        let mut agent = Agent::new(provider, Arc::new(tools), self.config);
        agent.system_prompt = system_prompt;
        agent.skills = skills;
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::testing::ScriptedProvider;
    use crate::tool::{ParameterSchema, ToolCall, ToolResult};
    use async_trait::async_trait;
    use serde_json::json;

    struct FakeTool {
        name: &'static str,
        output: String,
        delay: Option<Duration>,
    }

    impl FakeTool {
        fn new(name: &'static str, output: impl Into<String>) -> Self {
            Self {
                name,
                output: output.into(),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.name, "test tool")
                .param(ParameterSchema::optional("command", "string", "Command"))
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(call.success(self.output.clone()))
        }
    }

    fn tool_call(id: &str, name: &str) -> Completion {
        Completion::with_tool_calls("", vec![ToolCall::new(id, name, json!({"command": "ls"}))])
    }

    fn agent_with(provider: Arc<ScriptedProvider>, tools: Vec<FakeTool>) -> AgentBuilder {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        AgentBuilder::new().provider(provider).tools(registry)
    }

    #[tokio::test]
    async fn test_list_files_round_trip() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("call_1", "bash"),
            Completion::text("There are two files: a.txt and b.txt."),
        ]));
        let agent = agent_with(provider.clone(), vec![FakeTool::new("bash", "a.txt\nb.txt")])
            .build()
            .unwrap();

        let mut conversation = agent.new_conversation();
        let answer = agent.run(&mut conversation, "list files").await.unwrap();
        assert_eq!(answer, "There are two files: a.txt and b.txt.");

        let messages = conversation.messages();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(messages[2].tool_calls.len(), 1);
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[3].content, "a.txt\nb.txt");
        assert!(!messages[4].has_tool_calls());

        let requests = provider.agent_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools, vec!["bash"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_keeps_conversing() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("call_w", "write_file"),
            Completion::text("I cannot write files here."),
        ]));
        let agent = agent_with(provider.clone(), vec![FakeTool::new("read_file", "content")])
            .build()
            .unwrap();

        let mut conversation = agent.new_conversation();
        let answer = agent.run(&mut conversation, "write a file").await.unwrap();
        assert_eq!(answer, "I cannot write files here.");

        let tool_msg = conversation
            .messages()
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(tool_msg.is_error);
        assert!(tool_msg.content.contains("Unknown tool: write_file"));

        // The failure was shown to the model on the next call
        let requests = provider.agent_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].messages.iter().any(|m| m.is_error));
    }

    #[tokio::test]
    async fn test_tool_results_follow_call_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Completion::with_tool_calls(
                "Checking both.",
                vec![
                    ToolCall::new("b", "bash", json!({})),
                    ToolCall::new("a", "read_file", json!({})),
                    ToolCall::new("", "bash", json!({})),
                ],
            ),
            Completion::text("done"),
        ]));
        let agent = agent_with(
            provider,
            vec![FakeTool::new("read_file", "file"), FakeTool::new("bash", "shell")],
        )
        .build()
        .unwrap();

        let mut conversation = agent.new_conversation();
        agent.run(&mut conversation, "go").await.unwrap();

        let tool_ids: Vec<&str> = conversation
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(&tool_ids[..2], ["b", "a"]);
        assert!(tool_ids[2].starts_with("call_"));
    }

    #[tokio::test]
    async fn test_generated_call_ids_are_unique_across_runs() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("", "bash"),
            Completion::text("first"),
            tool_call("", "bash"),
            Completion::text("second"),
        ]));
        let agent = agent_with(provider, vec![FakeTool::new("bash", "ok")]).build().unwrap();

        let mut conversation = agent.new_conversation();
        agent.run(&mut conversation, "one").await.unwrap();
        agent.run(&mut conversation, "two").await.unwrap();

        let mut call_ids: Vec<&str> = conversation
            .messages()
            .iter()
            .flat_map(|m| m.tool_calls.iter().map(|c| c.id.as_str()))
            .collect();
        assert_eq!(call_ids.len(), 2);
        assert!(call_ids.iter().all(|id| !id.is_empty()));
        call_ids.dedup();
        assert_eq!(call_ids.len(), 2);

        let result_ids: Vec<&str> = conversation
            .messages()
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(result_ids, call_ids);
    }

    #[tokio::test]
    async fn test_step_limit_exceeded() {
        let provider = Arc::new(ScriptedProvider::always(tool_call("loop", "bash")));
        let agent = agent_with(provider.clone(), vec![FakeTool::new("bash", "again")])
            .max_steps(1)
            .build()
            .unwrap();

        let err = agent.ask("loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::StepLimitExceeded(1)));
        assert_eq!(provider.agent_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_compaction_on_second_step() {
        let big_output = "x".repeat(2000);
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("call_1", "bash"),
            Completion::text("finished"),
        ]));
        let agent = agent_with(provider.clone(), vec![FakeTool::new("bash", big_output.clone())])
            .max_steps(5)
            .token_limit(200)
            .build()
            .unwrap();

        let mut conversation = agent.new_conversation();
        let answer = agent.run(&mut conversation, "list files").await.unwrap();
        assert_eq!(answer, "finished");
        assert_eq!(provider.summary_requests(), 1);

        let summaries = conversation.messages().iter().filter(|m| m.summary).count();
        assert_eq!(summaries, 1);
        assert!(!conversation.messages().iter().any(|m| m.content == big_output));

        let requests = provider.agent_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].messages.iter().any(|m| m.summary));
        assert!(!requests[1].messages.iter().any(|m| m.content == big_output));
    }

    #[tokio::test]
    async fn test_request_after_compaction_is_smaller_than_history() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("call_1", "bash"),
            Completion::text("finished"),
        ]));
        let agent = agent_with(provider.clone(), vec![FakeTool::new("bash", "x".repeat(2000))])
            .max_steps(1)
            .token_limit(200)
            .build()
            .unwrap();

        // The first run stops after the tool step, leaving the history over budget
        let mut conversation = agent.new_conversation();
        let err = agent.run(&mut conversation, "list files").await.unwrap_err();
        assert!(matches!(err, AgentError::StepLimitExceeded(1)));
        assert!(conversation.exceeds_budget());
        let before = serde_json::to_string(conversation.messages()).unwrap().len();

        let answer = agent.run(&mut conversation, "continue").await.unwrap();
        assert_eq!(answer, "finished");
        assert_eq!(provider.summary_requests(), 1);

        let requests = provider.agent_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].messages.iter().any(|m| m.summary));
        assert!(requests[1].serialized_len() < before);
    }

    #[tokio::test]
    async fn test_provider_error_is_fatal() {
        let provider = Arc::new(
            ScriptedProvider::new(Vec::new()).then_err(AgentError::Auth("invalid x-api-key".into())),
        );
        let agent = agent_with(provider, vec![FakeTool::new("bash", "")]).build().unwrap();

        let mut conversation = agent.new_conversation();
        let err = agent.run(&mut conversation, "hi").await.unwrap_err();
        assert!(err.is_provider_error());
        assert_eq!(conversation.last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn test_retryable_errors_are_retried() {
        let provider = Arc::new(
            ScriptedProvider::new(Vec::new())
                .then_err(AgentError::RateLimited("429".into()))
                .then(Completion::text("ok")),
        );
        let agent = agent_with(provider.clone(), vec![FakeTool::new("bash", "")])
            .provider_retries(2, Duration::from_millis(1))
            .build()
            .unwrap();

        assert_eq!(agent.ask("hi").await.unwrap(), "ok");
        assert_eq!(provider.agent_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_step_appends_nothing() {
        let provider = Arc::new(ScriptedProvider::always(tool_call("slow", "bash")));
        let mut slow = FakeTool::new("bash", "late");
        slow.delay = Some(Duration::from_secs(5));
        let agent = agent_with(provider, vec![slow]).build().unwrap();

        let mut conversation = agent.new_conversation();
        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            agent.run(&mut conversation, "do something slow"),
        )
        .await;
        assert!(outcome.is_err());

        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
    }

    #[tokio::test]
    async fn test_builder_loads_skills() {
        let dir = tempfile::TempDir::new().unwrap();
        let skill_dir = dir.path().join("weather");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            "---\nname: weather\ndescription: Get weather information.\n---\n# Weather\n",
        )
        .unwrap();

        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let agent = agent_with(provider, Vec::new())
            .system_prompt("Base prompt.")
            .skills_dir(dir.path())
            .build()
            .unwrap();

        assert!(agent.system_prompt().starts_with("Base prompt."));
        assert!(agent.system_prompt().contains("- `weather`: Get weather information."));
        assert_eq!(agent.tools().names(), vec!["get_skill", "list_skills"]);
        assert_eq!(agent.skills().unwrap().len(), 1);
    }

    #[test]
    fn test_builder_requires_provider() {
        let err = AgentBuilder::new().build().err().unwrap();
        assert!(matches!(err, AgentError::Config(_)));
    }
}
