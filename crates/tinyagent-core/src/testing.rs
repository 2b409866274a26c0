//! Scripted provider shared by unit tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::memory::SUMMARY_SYSTEM_PROMPT;
use crate::message::{Message, Role};
use crate::provider::{Completion, GenerationOptions, LlmProvider};
use crate::tool::ToolDefinition;

/// One recorded `generate` call
#[derive(Clone, Debug)]
pub struct Request {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

impl Request {
    /// Requests opened by the summarization prompt
    pub fn is_summary(&self) -> bool {
        self.messages
            .first()
            .is_some_and(|m| m.content == SUMMARY_SYSTEM_PROMPT)
    }

    pub fn serialized_len(&self) -> usize {
        serde_json::to_string(&self.messages).map_or(0, |s| s.len())
    }
}

/// Replays scripted completions in order, then repeats `fallback`
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Completion>>>,
    fallback: Option<Completion>,
    summary: String,
    echo: bool,
    pub requests: Mutex<Vec<Request>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Completion>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(Ok).collect()),
            summary: "Summary of earlier work.".into(),
            ..Default::default()
        }
    }

    /// Answer every request with the same completion
    pub fn always(completion: Completion) -> Self {
        Self {
            fallback: Some(completion),
            ..Self::new(Vec::new())
        }
    }

    /// Answer with "echo: <last user message>"
    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Self::new(Vec::new())
        }
    }

    #[must_use]
    pub fn then_err(self, err: AgentError) -> Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    #[must_use]
    pub fn then(self, completion: Completion) -> Self {
        self.script.lock().unwrap().push_back(Ok(completion));
        self
    }

    /// Recorded requests that were not summarization calls
    pub fn agent_requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.is_summary())
            .cloned()
            .collect()
    }

    pub fn summary_requests(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_summary())
            .count()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        _options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = Request {
            messages: messages.to_vec(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
        };
        let is_summary = request.is_summary();
        self.requests.lock().unwrap().push(request);

        if is_summary {
            return Ok(Completion::text(self.summary.clone()));
        }

        if self.echo {
            let last_user = messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            return Ok(Completion::text(format!("echo: {}", last_user)));
        }

        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }

        self.fallback
            .clone()
            .ok_or_else(|| AgentError::Provider("script exhausted".into()))
    }
}
