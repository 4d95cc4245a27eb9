//! Error types for the conversation crate.
//!
//! - `ConversationError`: a turn or history violates the model invariants
//! - `StoreError`: a persistence operation failed

use crate::message::MessageRole;
use contrarian_core::ConversationId;
use std::fmt;

/// Violations of the conversation model invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// Message text was empty after trimming.
    EmptyText,
    /// Message text exceeds the character budget.
    TextTooLong { chars: usize, max: usize },
    /// A turn appeared where a different role was required.
    UnexpectedRole {
        position: usize,
        expected: MessageRole,
        found: MessageRole,
    },
    /// The history would contain a user turn that never received an answer.
    UnansweredTurn { position: usize },
    /// A conversation must contain at least its seed turn.
    EmptyHistory,
    /// The turn is already part of the history.
    DuplicateTurn { position: usize },
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyText => write!(f, "message text cannot be empty"),
            Self::TextTooLong { chars, max } => {
                write!(f, "message text is {chars} characters, limit is {max}")
            }
            Self::UnexpectedRole {
                position,
                expected,
                found,
            } => {
                write!(f, "turn {position} must be {expected}, found {found}")
            }
            Self::UnansweredTurn { position } => {
                write!(f, "user turn {position} has no reply")
            }
            Self::EmptyHistory => write!(f, "conversation has no turns"),
            Self::DuplicateTurn { position } => {
                write!(f, "turn {position} was already recorded")
            }
        }
    }
}

impl std::error::Error for ConversationError {}

/// Errors from conversation store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No conversation exists with this identifier.
    NotFound { id: ConversationId },
    /// The backing store could not be reached or failed mid-operation.
    Unavailable { reason: String },
    /// The turns handed to the store would break the history invariants.
    InvalidTurns(ConversationError),
}

impl StoreError {
    /// Builds an `Unavailable` error from any displayable cause.
    pub fn unavailable(reason: impl fmt::Display) -> Self {
        Self::Unavailable {
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "conversation not found: {id}"),
            Self::Unavailable { reason } => write!(f, "conversation store unavailable: {reason}"),
            Self::InvalidTurns(e) => write!(f, "rejected turns: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidTurns(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConversationError> for StoreError {
    fn from(e: ConversationError) -> Self {
        Self::InvalidTurns(e)
    }
}
