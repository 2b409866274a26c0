//! Conversation Memory
//!
//! Token-budget compaction of the conversation window. When the estimate goes
//! over budget, every assistant and tool message is folded into one summary
//! produced by an extra LLM request. The system prompt and all user messages
//! are left untouched.

use std::fmt::Write as _;

use crate::error::Result;
use crate::message::{Conversation, Message, Role};
use crate::provider::{GenerationOptions, LlmProvider};

/// Instructions for the summarization request
pub const SUMMARY_SYSTEM_PROMPT: &str = "You compress an AI agent's working history so it can continue \
with a smaller context. Write a concise summary of the assistant's progress. Keep key decisions, \
facts discovered (file paths, values, command results that matter) and the current state of the task, \
including what remains to be done. Drop verbose tool output, repeated attempts and pleasantries. \
Reply with the summary only.";

/// Prefix marking a synthetic summary in the transcript
pub const SUMMARY_HEADER: &str = "[Conversation Summary]";

/// Tool output longer than this is clipped before being sent for summarization
const MAX_TOOL_OUTPUT_CHARS: usize = 4000;

/// Outcome of [`maybe_compress`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Compression {
    /// Estimate is within budget
    NotNeeded,
    /// The latest tool-calling turn is still waiting for results
    Deferred,
    /// Nothing worth compacting, or the summary would not shrink the window
    Skipped,
    /// Candidates were replaced by one summary message
    Compressed {
        replaced: usize,
        tokens_before: u32,
        tokens_after: u32,
    },
}

/// Compact the conversation if it is over its token budget
pub async fn maybe_compress(
    conversation: &mut Conversation,
    provider: &dyn LlmProvider,
    options: &GenerationOptions,
) -> Result<Compression> {
    let tokens_before = conversation.estimate_tokens();
    if !conversation.exceeds_budget() {
        return Ok(Compression::NotNeeded);
    }

    if conversation.has_pending_tool_calls() {
        tracing::warn!("Deferring compaction until pending tool calls complete");
        return Ok(Compression::Deferred);
    }

    let candidates = conversation.compaction_candidates();
    if candidates.is_empty() || (candidates.len() == 1 && candidates[0].summary) {
        tracing::debug!(tokens = tokens_before, "Over budget but nothing to compact");
        return Ok(Compression::Skipped);
    }

    tracing::info!(
        tokens = tokens_before,
        limit = conversation.token_limit(),
        messages = candidates.len(),
        "Summarizing conversation history"
    );

    let request = [
        Message::system(SUMMARY_SYSTEM_PROMPT),
        Message::user(render_transcript(conversation)),
    ];
    let completion = provider.generate(&request, &[], options).await?;

    let summary = completion.content.trim();
    if summary.is_empty() {
        tracing::warn!("Summarization returned no text; keeping history");
        return Ok(Compression::Skipped);
    }

    let mut compacted = conversation.clone();
    let replaced = compacted.apply_summary(Message::summary(format!("{}\n\n{}", SUMMARY_HEADER, summary)));
    let tokens_after = compacted.estimate_tokens();

    if tokens_after >= tokens_before {
        tracing::warn!(
            tokens_before,
            tokens_after,
            "Summary would not shrink the conversation; keeping history"
        );
        return Ok(Compression::Skipped);
    }

    *conversation = compacted;
    tracing::info!(replaced, tokens_before, tokens_after, "Conversation compacted");

    Ok(Compression::Compressed {
        replaced,
        tokens_before,
        tokens_after,
    })
}

/// Render the non-system history as plain text for the summarizer
fn render_transcript(conversation: &Conversation) -> String {
    let mut out = String::from("Summarize the assistant's work in this conversation:\n\n");

    for message in conversation.messages() {
        match message.role {
            Role::System => {}
            Role::User => {
                let _ = writeln!(out, "[user]\n{}\n", message.content);
            }
            Role::Assistant => {
                let _ = writeln!(out, "[assistant]\n{}", message.content);
                for call in &message.tool_calls {
                    let _ = writeln!(out, "-> call {}({})", call.name, call.arguments);
                }
                out.push('\n');
            }
            Role::Tool => {
                let name = message.name.as_deref().unwrap_or("tool");
                let status = if message.is_error { "error" } else { "ok" };
                let _ = writeln!(
                    out,
                    "[tool {} {}]\n{}\n",
                    name,
                    status,
                    clip(&message.content, MAX_TOOL_OUTPUT_CHARS)
                );
            }
        }
    }

    out
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let clipped: String = text.chars().take(max_chars).collect();
    format!("{}... [truncated]", clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Completion;
    use crate::tool::{ToolCall, ToolDefinition, ToolResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedSummary {
        text: String,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl FixedSummary {
        fn new(text: &str) -> Self {
            Self {
                text: text.into(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FixedSummary {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(
            &self,
            messages: &[Message],
            tools: &[ToolDefinition],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            assert!(tools.is_empty());
            self.requests.lock().unwrap().push(messages.to_vec());
            Ok(Completion::text(self.text.clone()))
        }
    }

    fn long_conversation(limit: u32) -> Conversation {
        let mut conv = Conversation::with_system_prompt("You are TinyAgent.").with_token_limit(limit);
        conv.push(Message::user("list files"));
        conv.push(Message::assistant_with_tools(
            "Listing.",
            vec![ToolCall::new("c1", "bash", json!({"command": "ls -la"}))],
        ));
        conv.push(Message::tool(&ToolResult::success("c1", "bash", "file\n".repeat(1000))));
        conv.push(Message::assistant("There are many files."));
        conv.push(Message::user("now count them"));
        conv
    }

    #[tokio::test]
    async fn test_under_budget_is_untouched() {
        let provider = FixedSummary::new("unused");
        let mut conv = long_conversation(1_000_000);
        let before = conv.clone();

        let outcome = maybe_compress(&mut conv, &provider, &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome, Compression::NotNeeded);
        assert_eq!(conv.messages(), before.messages());
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compression_preserves_system_and_users() {
        let provider = FixedSummary::new("Listed 500 files in the workspace.");
        let mut conv = long_conversation(100);
        let system_before = conv.system().cloned().unwrap();
        let users_before: Vec<Message> = conv.user_messages().cloned().collect();

        for _ in 0..3 {
            maybe_compress(&mut conv, &provider, &GenerationOptions::default())
                .await
                .unwrap();
            assert_eq!(conv.system().unwrap(), &system_before);
            let users_after: Vec<Message> = conv.user_messages().cloned().collect();
            assert_eq!(users_after, users_before);
        }
    }

    #[tokio::test]
    async fn test_compression_replaces_span_with_one_summary() {
        let provider = FixedSummary::new("Listed 500 files in the workspace.");
        let mut conv = long_conversation(100);

        let outcome = maybe_compress(&mut conv, &provider, &GenerationOptions::default())
            .await
            .unwrap();

        let Compression::Compressed {
            replaced,
            tokens_before,
            tokens_after,
        } = outcome
        else {
            panic!("expected compression, got {:?}", outcome);
        };
        assert_eq!(replaced, 3);
        assert!(tokens_after < tokens_before);

        let summaries: Vec<&Message> = conv.messages().iter().filter(|m| m.summary).collect();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].role, Role::Assistant);
        assert!(summaries[0].content.starts_with(SUMMARY_HEADER));

        // The summarizer saw the transcript, clipped
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0][1].content.contains("-> call bash"));
        assert!(requests[0][1].content.contains("[truncated]"));
    }

    #[test]
    fn test_clip_boundary() {
        let exact = "x".repeat(MAX_TOOL_OUTPUT_CHARS);
        assert_eq!(clip(&exact, MAX_TOOL_OUTPUT_CHARS), exact);

        let over = "x".repeat(MAX_TOOL_OUTPUT_CHARS + 1);
        let clipped = clip(&over, MAX_TOOL_OUTPUT_CHARS);
        assert!(clipped.ends_with("... [truncated]"));
        assert_eq!(clipped.matches('x').count(), MAX_TOOL_OUTPUT_CHARS);
    }

    #[tokio::test]
    async fn test_lone_summary_is_not_resummarized() {
        let provider = FixedSummary::new("short");
        let mut conv = long_conversation(10);
        maybe_compress(&mut conv, &provider, &GenerationOptions::default())
            .await
            .unwrap();

        // Still over the tiny budget, but only the summary is left to compact
        let outcome = maybe_compress(&mut conv, &provider, &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, Compression::Skipped);
        assert_eq!(provider.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_tool_calls_defer_compression() {
        let provider = FixedSummary::new("unused");
        let mut conv = long_conversation(100);
        conv.push(Message::assistant_with_tools(
            "",
            vec![ToolCall::new("c2", "bash", json!({"command": "wc -l"}))],
        ));

        let outcome = maybe_compress(&mut conv, &provider, &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, Compression::Deferred);
    }

    #[tokio::test]
    async fn test_summary_that_does_not_shrink_is_rejected() {
        let provider = FixedSummary::new(&"padding ".repeat(2000));
        let mut conv = long_conversation(100);
        let before = conv.clone();

        let outcome = maybe_compress(&mut conv, &provider, &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, Compression::Skipped);
        assert_eq!(conv.messages(), before.messages());
    }
}
