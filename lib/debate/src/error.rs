//! Errors returned by the debate orchestrator.
//!
//! Every failure names the phase it happened in and maps to a stable
//! [`DebateErrorKind`]. Callers receive them wrapped in a rootcause `Report`
//! through [`contrarian_core::Result`].

use contrarian_ai::ProviderError;
use contrarian_conversation::{ConversationError, StoreError};
use contrarian_core::ConversationId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a request at the moment it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    /// Checking the incoming text, before any store access.
    Validating,
    /// Creating or loading the conversation.
    Resolving,
    /// Waiting on the completion provider.
    Generating,
    /// Appending the answered pair.
    Persisting,
}

impl DebatePhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Resolving => "resolving",
            Self::Generating => "generating",
            Self::Persisting => "persisting",
        }
    }
}

impl fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable classification used for status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateErrorKind {
    InvalidInput,
    ConversationNotFound,
    GenerationFailed,
    PersistenceFailed,
    StoreUnavailable,
}

impl DebateErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::ConversationNotFound => "conversation_not_found",
            Self::GenerationFailed => "generation_failed",
            Self::PersistenceFailed => "persistence_failed",
            Self::StoreUnavailable => "store_unavailable",
        }
    }
}

impl fmt::Display for DebateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a debate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebateError {
    /// The message text was rejected.
    InvalidInput { reason: ConversationError },
    /// No conversation answers to this identifier.
    ConversationNotFound { id: String },
    /// Every allowed provider attempt failed. The conversation is unchanged.
    GenerationFailed {
        conversation_id: ConversationId,
        attempts: u32,
        last: ProviderError,
    },
    /// The answered pair could not be stored; the reply was discarded.
    PersistenceFailed {
        conversation_id: ConversationId,
        reason: StoreError,
    },
    /// The store could not be reached while loading or creating.
    StoreUnavailable { reason: String },
}

impl DebateError {
    #[must_use]
    pub const fn kind(&self) -> DebateErrorKind {
        match self {
            Self::InvalidInput { .. } => DebateErrorKind::InvalidInput,
            Self::ConversationNotFound { .. } => DebateErrorKind::ConversationNotFound,
            Self::GenerationFailed { .. } => DebateErrorKind::GenerationFailed,
            Self::PersistenceFailed { .. } => DebateErrorKind::PersistenceFailed,
            Self::StoreUnavailable { .. } => DebateErrorKind::StoreUnavailable,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> DebatePhase {
        match self {
            Self::InvalidInput { .. } => DebatePhase::Validating,
            Self::ConversationNotFound { .. } | Self::StoreUnavailable { .. } => {
                DebatePhase::Resolving
            }
            Self::GenerationFailed { .. } => DebatePhase::Generating,
            Self::PersistenceFailed { .. } => DebatePhase::Persisting,
        }
    }

    /// Returns true if the caller's input or identifier was at fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::ConversationNotFound { .. }
        )
    }

    /// Maps a store failure while loading or creating a conversation.
    pub(crate) fn resolving(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { id } => Self::ConversationNotFound { id: id.to_string() },
            StoreError::Unavailable { reason } => Self::StoreUnavailable { reason },
            StoreError::InvalidTurns(e) => Self::StoreUnavailable {
                reason: format!("stored history is inconsistent: {e}"),
            },
        }
    }
}

impl fmt::Display for DebateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { reason } => write!(f, "invalid input: {reason}"),
            Self::ConversationNotFound { id } => write!(f, "conversation not found: {id}"),
            Self::GenerationFailed {
                conversation_id,
                attempts,
                last,
            } => write!(
                f,
                "could not generate a reply for {conversation_id} after {attempts} attempt(s): {last}"
            ),
            Self::PersistenceFailed {
                conversation_id,
                reason,
            } => write!(f, "could not store turns for {conversation_id}: {reason}"),
            Self::StoreUnavailable { reason } => {
                write!(f, "conversation store unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for DebateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidInput { reason } => Some(reason),
            Self::GenerationFailed { last, .. } => Some(last),
            Self::PersistenceFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
