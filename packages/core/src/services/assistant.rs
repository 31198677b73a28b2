//! Conversational support assistant on top of a [`TextCompletion`] backend.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::gemini::{CompletionRequest, TextCompletion};

/// Shown in place of a reply when the completion call fails.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Messages of history sent as context (three exchanges).
const CONTEXT_MESSAGES: usize = 6;

const SYSTEM_PREAMBLE: &str = "You are a helpful customer support assistant for a VPS hosting and P2P internet sharing platform. \
Be concise, friendly, and technical when needed. Focus on VPS management, P2P networking, billing, and troubleshooting.";

const DEFAULT_SUGGESTIONS: [&str; 3] = [
    "How can I optimize my network?",
    "What are the best pricing strategies?",
    "How do I improve connection quality?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

pub struct Assistant {
    backend: Arc<dyn TextCompletion>,
    history: Vec<AssistantMessage>,
}

impl Assistant {
    pub fn new(backend: Arc<dyn TextCompletion>) -> Self {
        Self {
            backend,
            history: Vec::new(),
        }
    }

    fn push(&mut self, role: Role, content: String) -> AssistantMessage {
        let now = Utc::now();
        let suffix = match role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let message = AssistantMessage {
            id: format!("msg_{}_{}_{}", now.timestamp_millis(), self.history.len(), suffix),
            role,
            content,
            timestamp: now,
        };
        self.history.push(message.clone());
        message
    }

    fn context(&self) -> String {
        let skip = self.history.len().saturating_sub(CONTEXT_MESSAGES);
        let transcript = self
            .history
            .iter()
            .skip(skip)
            .map(|m| match m.role {
                Role::User => format!("User: {}", m.content),
                Role::Assistant => format!("Assistant: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}\n\nPrevious conversation:\n{}\n",
            SYSTEM_PREAMBLE, transcript
        )
    }

    /// Record the user's message and return the assistant's reply. A failed
    /// completion yields [`FALLBACK_REPLY`] rather than an error.
    pub async fn send_message(&mut self, text: &str) -> AssistantMessage {
        self.push(Role::User, text.to_string());

        let request = CompletionRequest::new(text)
            .with_context(self.context())
            .with_max_tokens(600);
        let response = self.backend.generate(&request).await;

        let content = if response.success {
            response.text
        } else {
            FALLBACK_REPLY.to_string()
        };
        self.push(Role::Assistant, content)
    }

    pub fn history(&self) -> &[AssistantMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Up to three follow-up questions for the given screen context.
    pub async fn quick_suggestions(&self, context: &str) -> Vec<String> {
        let request = CompletionRequest::new(format!(
            "Based on this context: \"{}\", provide 3 short question suggestions (max 8 words each) that a user might ask. Format as a simple list, one per line.",
            context
        ))
        .with_max_tokens(150);

        let response = self.backend.generate(&request).await;
        if response.success {
            let lines: Vec<String> = response
                .text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .take(3)
                .map(str::to_string)
                .collect();
            if !lines.is_empty() {
                return lines;
            }
        }

        DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::services::gemini::AiServiceError;

    /// Replies with a fixed result and remembers every request.
    struct ScriptedBackend {
        reply: Result<String, AiServiceError>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedBackend {
        fn new(reply: Result<String, AiServiceError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextCompletion for ScriptedBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, AiServiceError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn reply_is_recorded_after_user_message() {
        let backend = ScriptedBackend::new(Ok("Check your router.".to_string()));
        let mut assistant = Assistant::new(backend.clone());

        let reply = assistant.send_message("My speed is low").await;

        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "Check your router.");
        assert_eq!(assistant.history().len(), 2);
        assert_eq!(assistant.history()[0].role, Role::User);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].prompt, "My speed is low");
        assert!(seen[0].context.as_ref().unwrap().contains("User: My speed is low"));
        assert_eq!(seen[0].max_tokens, Some(600));
    }

    #[tokio::test]
    async fn failure_yields_fallback_reply() {
        let backend = ScriptedBackend::new(Err(AiServiceError::Network {
            message: "timeout".to_string(),
        }));
        let mut assistant = Assistant::new(backend);

        let reply = assistant.send_message("hello").await;
        assert_eq!(reply.content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn context_is_limited_to_last_six_messages() {
        let backend = ScriptedBackend::new(Ok("ok".to_string()));
        let mut assistant = Assistant::new(backend.clone());

        for i in 0..5 {
            assistant.send_message(&format!("question {}", i)).await;
        }

        let seen = backend.seen.lock().unwrap();
        let last_context = seen.last().unwrap().context.clone().unwrap();
        assert!(last_context.contains("question 4"));
        assert!(last_context.contains("question 2"));
        assert!(!last_context.contains("question 1"));
    }

    #[tokio::test]
    async fn clear_history_empties_transcript() {
        let mut assistant = Assistant::new(ScriptedBackend::new(Ok("ok".to_string())));
        assistant.send_message("hi").await;
        assistant.clear_history();
        assert!(assistant.history().is_empty());
    }

    #[tokio::test]
    async fn suggestions_take_first_three_non_empty_lines() {
        let backend = ScriptedBackend::new(Ok("A?\n\n B? \nC?\nD?".to_string()));
        let assistant = Assistant::new(backend);
        assert_eq!(
            assistant.quick_suggestions("pricing").await,
            vec!["A?", "B?", "C?"]
        );
    }

    #[tokio::test]
    async fn suggestions_fall_back_to_defaults() {
        let assistant = Assistant::new(ScriptedBackend::new(Err(AiServiceError::NotConfigured)));
        let suggestions = assistant.quick_suggestions("pricing").await;
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0], "How can I optimize my network?");
    }
}
