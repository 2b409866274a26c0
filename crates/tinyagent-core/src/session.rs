//! Session Management
//!
//! A session pairs a shared agent with one conversation. Sessions never share
//! history, so many can run against the same `Arc<Agent>` concurrently.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::message::{Conversation, Role};
use crate::reasoning::Agent;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One conversation driven by a shared agent
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    agent: Arc<Agent>,
    conversation: Conversation,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with a fresh conversation
    pub fn new(agent: Arc<Agent>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            conversation: agent.new_conversation(),
            agent,
            created_at: now,
            updated_at: now,
        }
    }

    /// Send one user message through the agent
    pub async fn run(&mut self, user_text: &str) -> Result<String> {
        let span = tracing::info_span!("session", id = %self.id);
        let result = self
            .agent
            .run(&mut self.conversation, user_text)
            .instrument(span)
            .await;
        self.touch();
        result
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Title generated from the first user message
    pub fn title(&self) -> String {
        self.conversation
            .messages()
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| {
                let preview: String = m.content.chars().take(50).collect();
                if m.content.chars().count() > 50 {
                    format!("{}...", preview)
                } else {
                    preview
                }
            })
            .unwrap_or_else(|| format!("Session {}", &self.id.0[..8]))
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Drop all history but keep the system prompt
    pub fn reset(&mut self) {
        self.conversation.clear_history();
        self.touch();
    }

    /// Message count
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    fn echo_agent() -> Arc<Agent> {
        Arc::new(
            Agent::builder()
                .provider(Arc::new(ScriptedProvider::echo()))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_session_creation() {
        let session = echo_agent().session();
        assert_eq!(session.message_count(), 1);
        assert!(session.title().starts_with("Session "));
    }

    #[tokio::test]
    async fn test_session_title_from_first_message() {
        let mut session = echo_agent().session();
        session.run("find the largest file").await.unwrap();
        assert_eq!(session.title(), "find the largest file");

        session.reset();
        assert_eq!(session.message_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_stay_isolated() {
        let agent = echo_agent();

        let mut handles = Vec::new();
        for i in 0..8 {
            let mut session = agent.session();
            handles.push(tokio::spawn(async move {
                let reply = session.run(&format!("task {}", i)).await.unwrap();
                (i, reply, session)
            }));
        }

        for handle in handles {
            let (i, reply, session) = handle.await.unwrap();
            assert_eq!(reply, format!("echo: task {}", i));

            let users: Vec<&str> = session
                .conversation()
                .user_messages()
                .map(|m| m.content.as_str())
                .collect();
            assert_eq!(users, vec![format!("task {}", i)]);
        }
    }
}
