//! Deriving a conversation topic from its seed turn.

use crate::conversation::MAX_TOPIC_CHARS;

/// Turns the first user message into a short topic line.
pub trait TopicDeriver: Send + Sync {
    /// Returns the topic for a conversation seeded with `first_message`.
    fn derive(&self, first_message: &str) -> String;
}

/// Collapses whitespace and truncates to a character budget.
///
/// Truncated topics end with `...`, counted inside the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncatedTopic {
    max_chars: usize,
}

impl TruncatedTopic {
    /// Budget used by [`TruncatedTopic::default`].
    pub const DEFAULT_MAX_CHARS: usize = 80;

    const ELLIPSIS: &'static str = "...";

    /// Creates a deriver with the given budget, clamped to `4..=MAX_TOPIC_CHARS`.
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.clamp(Self::ELLIPSIS.len() + 1, MAX_TOPIC_CHARS),
        }
    }

    #[must_use]
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }
}

impl Default for TruncatedTopic {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_CHARS)
    }
}

impl TopicDeriver for TruncatedTopic {
    fn derive(&self, first_message: &str) -> String {
        let normalized = first_message.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.chars().count() <= self.max_chars {
            return normalized;
        }
        let keep = self.max_chars - Self::ELLIPSIS.len();
        let head: String = normalized.chars().take(keep).collect();
        format!("{}{}", head.trim_end(), Self::ELLIPSIS)
    }
}
