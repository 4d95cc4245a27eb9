//! Completion provider abstraction.
//!
//! A provider turns a stance instruction plus the debate so far into the
//! next opposing reply. Providers are stateless; everything they need is in
//! the [`CompletionRequest`].

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Who spoke a turn, from the provider's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The human whose position is being argued against.
    User,
    /// A previous generated rebuttal.
    Opponent,
}

/// One turn of history handed to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub speaker: Speaker,
    pub text: String,
}

impl ChatTurn {
    /// Creates a user turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    /// Creates a turn spoken by the opponent.
    #[must_use]
    pub fn opponent(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Opponent,
            text: text.into(),
        }
    }
}

/// A request for the next rebuttal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Instruction fixing the adversarial persona.
    pub stance: String,
    /// The ordered history, ending with the turn to answer.
    pub history: Vec<ChatTurn>,
}

impl CompletionRequest {
    /// Creates a request with an empty history.
    #[must_use]
    pub fn new(stance: impl Into<String>) -> Self {
        Self {
            stance: stance.into(),
            history: Vec::new(),
        }
    }

    /// Replaces the history.
    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    /// Appends one turn to the history.
    #[must_use]
    pub fn with_turn(mut self, turn: ChatTurn) -> Self {
        self.history.push(turn);
        self
    }

    /// The turn the provider is asked to answer.
    #[must_use]
    pub fn pending(&self) -> Option<&ChatTurn> {
        self.history.last()
    }
}

/// Trait for completion backends.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generates the reply text for `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream call fails.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<P: CompletionProvider + ?Sized> CompletionProvider for Arc<P> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        (**self).complete(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let request = CompletionRequest::new("argue back")
            .with_turn(ChatTurn::user("Cats are better than dogs"))
            .with_turn(ChatTurn::opponent("Dogs are loyal"))
            .with_turn(ChatTurn::user("Cats are independent"));

        assert_eq!(request.stance, "argue back");
        assert_eq!(request.history.len(), 3);
        assert_eq!(
            request.pending(),
            Some(&ChatTurn::user("Cats are independent"))
        );
    }

    #[test]
    fn speaker_serializes_lowercase() {
        let json = serde_json::to_string(&ChatTurn::opponent("no")).expect("serialize");
        assert_eq!(json, r#"{"speaker":"opponent","text":"no"}"#);
    }
}
