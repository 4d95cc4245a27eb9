//! A single turn of a debate.

use crate::error::ConversationError;
use chrono::{DateTime, Utc};
use contrarian_core::MessageId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on the length of a turn, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The human arguing a position.
    User,
    /// The generated rebuttal.
    Bot,
}

impl MessageRole {
    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "bot" => Ok(Self::Bot),
            other => Err(format!("unknown message role '{other}'")),
        }
    }
}

/// An immutable turn in a conversation.
///
/// Text is trimmed on construction and must be non-empty and within
/// [`MAX_MESSAGE_CHARS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: MessageRole,
    text: String,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a turn stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed text is empty or too long.
    pub fn new(role: MessageRole, text: impl AsRef<str>) -> Result<Self, ConversationError> {
        Self::restore(MessageId::new(), role, text, Utc::now())
    }

    /// Creates a user turn.
    ///
    /// # Errors
    ///
    /// See [`Message::new`].
    pub fn user(text: impl AsRef<str>) -> Result<Self, ConversationError> {
        Self::new(MessageRole::User, text)
    }

    /// Creates a bot turn.
    ///
    /// # Errors
    ///
    /// See [`Message::new`].
    pub fn bot(text: impl AsRef<str>) -> Result<Self, ConversationError> {
        Self::new(MessageRole::Bot, text)
    }

    /// Rebuilds a stored turn from its parts, re-checking the text rules.
    ///
    /// # Errors
    ///
    /// See [`Message::new`].
    pub fn restore(
        id: MessageId,
        role: MessageRole,
        text: impl AsRef<str>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ConversationError> {
        Ok(Self {
            id,
            role,
            text: validate_text(text.as_ref())?,
            created_at,
        })
    }

    /// Unique identifier of this turn.
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Who produced this turn.
    #[must_use]
    pub fn role(&self) -> MessageRole {
        self.role
    }

    /// The trimmed turn text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// When the turn was recorded.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Moves the timestamp forward to `floor` if it is earlier.
    pub(crate) fn not_before(mut self, floor: DateTime<Utc>) -> Self {
        if self.created_at < floor {
            self.created_at = floor;
        }
        self
    }
}

/// Trims `text` and checks it against the length rules.
///
/// # Errors
///
/// Returns [`ConversationError::EmptyText`] or
/// [`ConversationError::TextTooLong`].
pub fn validate_text(text: &str) -> Result<String, ConversationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConversationError::EmptyText);
    }
    let chars = trimmed.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(ConversationError::TextTooLong {
            chars,
            max: MAX_MESSAGE_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn user_message_is_trimmed() {
        let msg = Message::user("  The sky is blue \n").expect("valid");
        assert_eq!(msg.role(), MessageRole::User);
        assert_eq!(msg.text(), "The sky is blue");
    }

    #[test]
    fn whitespace_only_is_rejected() {
        assert_eq!(Message::bot(" \t\n").unwrap_err(), ConversationError::EmptyText);
        assert_eq!(Message::user("").unwrap_err(), ConversationError::EmptyText);
    }

    #[test]
    fn length_is_counted_in_characters() {
        let at_limit = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(Message::user(&at_limit).is_ok());

        let over = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert_eq!(
            Message::user(over).unwrap_err(),
            ConversationError::TextTooLong {
                chars: MAX_MESSAGE_CHARS + 1,
                max: MAX_MESSAGE_CHARS
            }
        );
    }

    #[test]
    fn not_before_only_moves_forward() {
        let msg = Message::user("hi").expect("valid");
        let earlier = msg.created_at() - Duration::seconds(5);
        let later = msg.created_at() + Duration::seconds(5);

        assert_eq!(msg.clone().not_before(earlier).created_at(), msg.created_at());
        assert_eq!(msg.not_before(later).created_at(), later);
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [MessageRole::User, MessageRole::Bot] {
            assert_eq!(role.as_str().parse::<MessageRole>(), Ok(role));
        }
        assert!("assistant".parse::<MessageRole>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Bot).expect("serialize");
        assert_eq!(json, "\"bot\"");
    }
}
