//! Stance instructions and chat-message assembly.

use crate::backend::{CompletionRequest, Speaker};
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_STANCE: &str = "You are an expert debater. Whatever position the user takes, \
argue the opposite one and defend it.

Requirements:
1. Take the opposite view from every user message in the conversation
2. Stay consistent with the positions you argued in earlier replies
3. Be concise and persuasive
4. Offer a compelling counterargument rather than agreeing
5. Reply with the argument text only";

/// The fixed persona instruction sent ahead of every history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stance(String);

impl Stance {
    /// Creates a stance from custom instruction text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Starts a request carrying this stance.
    #[must_use]
    pub fn request(&self) -> CompletionRequest {
        CompletionRequest::new(self.0.clone())
    }
}

impl Default for Stance {
    fn default() -> Self {
        Self::new(DEFAULT_STANCE)
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of a message in a chat-completions payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A message in a chat-completions payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl From<Speaker> for ChatRole {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::User => Self::User,
            Speaker::Opponent => Self::Assistant,
        }
    }
}

/// Lays out a request as chat messages: the stance as the system message,
/// then the history in order.
#[must_use]
pub fn chat_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 1);
    messages.push(ChatMessage {
        role: ChatRole::System,
        content: request.stance.clone(),
    });
    messages.extend(request.history.iter().map(|turn| ChatMessage {
        role: turn.speaker.into(),
        content: turn.text.clone(),
    }));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatTurn;

    #[test]
    fn default_stance_demands_the_opposite_view() {
        let stance = Stance::default();
        assert!(stance.as_str().contains("opposite"));
        assert!(stance.as_str().contains("consistent"));
    }

    #[test]
    fn stance_starts_an_empty_request() {
        let request = Stance::new("disagree").request();
        assert_eq!(request.stance, "disagree");
        assert!(request.history.is_empty());
    }

    #[test]
    fn chat_messages_put_stance_first() {
        let request = Stance::new("disagree")
            .request()
            .with_turn(ChatTurn::user("Tea beats coffee"))
            .with_turn(ChatTurn::opponent("Coffee wins"))
            .with_turn(ChatTurn::user("Tea is calmer"));

        let messages = chat_messages(&request);
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User
            ]
        );
        assert_eq!(messages[0].content, "disagree");
        assert_eq!(messages[3].content, "Tea is calmer");
    }

    #[test]
    fn chat_role_wire_names() {
        let json = serde_json::to_string(&ChatMessage {
            role: ChatRole::Assistant,
            content: "x".to_string(),
        })
        .expect("serialize");
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
