//! Request and reply shapes exchanged with callers.

use chrono::{DateTime, Utc};
use contrarian_conversation::{Conversation, Message, MessageRole};
use contrarian_core::ConversationId;
use serde::{Deserialize, Serialize};

/// An incoming debate message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateRequest {
    /// Absent to start a new conversation.
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub message: String,
}

impl DebateRequest {
    /// A message starting a new conversation.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            conversation_id: None,
            message: message.into(),
        }
    }

    /// A message continuing `conversation_id`.
    #[must_use]
    pub fn continuing(conversation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            message: message.into(),
        }
    }
}

/// One turn as shown to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnView {
    pub role: MessageRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for TurnView {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role(),
            text: message.text().to_string(),
            created_at: message.created_at(),
        }
    }
}

/// A conversation snapshot as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateReply {
    pub conversation_id: ConversationId,
    pub topic: String,
    pub messages: Vec<TurnView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for DebateReply {
    fn from(conversation: &Conversation) -> Self {
        Self {
            conversation_id: conversation.id(),
            topic: conversation.topic().to_string(),
            messages: conversation.turns().iter().map(TurnView::from).collect(),
            created_at: conversation.created_at(),
            updated_at: conversation.updated_at(),
        }
    }
}

impl From<Conversation> for DebateReply {
    fn from(conversation: Conversation) -> Self {
        Self::from(&conversation)
    }
}
