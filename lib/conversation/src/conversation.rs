//! The append-only debate history.
//!
//! A conversation starts with a single user turn (the seed) and grows only
//! by (user, bot) pairs. Appending a pair whose user turn *is* the seed
//! answers the seed, so only the bot turn is added. The seed is the one user
//! turn allowed to stay unanswered: if the first reply could not be
//! generated, the next pair is appended directly after it.

use crate::error::ConversationError;
use crate::message::{Message, MessageRole};
use chrono::{DateTime, Utc};
use contrarian_core::ConversationId;
use serde::{Deserialize, Serialize};

/// Upper bound on the length of a topic, in characters.
pub const MAX_TOPIC_CHARS: usize = 200;

/// A debate conversation snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    topic: String,
    turns: Vec<Message>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Starts a conversation from its seed turn.
    ///
    /// The topic is cut to [`MAX_TOPIC_CHARS`].
    ///
    /// # Errors
    ///
    /// Returns an error if `seed` is not a user turn.
    pub fn start(seed: Message, topic: impl Into<String>) -> Result<Self, ConversationError> {
        if seed.role() != MessageRole::User {
            return Err(ConversationError::UnexpectedRole {
                position: 0,
                expected: MessageRole::User,
                found: seed.role(),
            });
        }
        let created_at = seed.created_at();
        Ok(Self {
            id: ConversationId::new(),
            topic: clamp_topic(topic.into()),
            turns: vec![seed],
            created_at,
            updated_at: created_at,
        })
    }

    /// Rebuilds a stored conversation, re-checking turn order.
    ///
    /// # Errors
    ///
    /// Returns an error if `turns` is empty or out of order.
    pub fn restore(
        id: ConversationId,
        topic: impl Into<String>,
        turns: Vec<Message>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ConversationError> {
        check_turn_order(&turns)?;
        Ok(Self {
            id,
            topic: clamp_topic(topic.into()),
            turns,
            created_at,
            updated_at,
        })
    }

    /// Appends an answered pair.
    ///
    /// When `user` is the unanswered seed itself (same id), only `bot` is
    /// added. Timestamps are clamped so the history stays monotonic. Nothing
    /// is modified when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the roles are not (user, bot) or the history ends
    /// with an unanswered turn other than the seed.
    pub fn append_pair(&mut self, user: Message, bot: Message) -> Result<(), ConversationError> {
        let next = self.turns.len();
        if user.role() != MessageRole::User {
            return Err(ConversationError::UnexpectedRole {
                position: next,
                expected: MessageRole::User,
                found: user.role(),
            });
        }
        if bot.role() != MessageRole::Bot {
            return Err(ConversationError::UnexpectedRole {
                position: next + 1,
                expected: MessageRole::Bot,
                found: bot.role(),
            });
        }
        if next > 1 && self.is_awaiting_reply() {
            return Err(ConversationError::UnansweredTurn { position: next - 1 });
        }

        let answers_seed = next == 1 && self.turns[0].id() == user.id();
        let duplicate = self.turns.iter().enumerate().find(|(i, m)| {
            m.id() == bot.id() || (m.id() == user.id() && !(answers_seed && *i == 0))
        });
        if let Some((position, _)) = duplicate {
            return Err(ConversationError::DuplicateTurn { position });
        }

        let floor = self
            .turns
            .last()
            .map_or(self.created_at, Message::created_at);

        if answers_seed {
            let bot = bot.not_before(floor);
            self.updated_at = Utc::now().max(bot.created_at());
            self.turns.push(bot);
            return Ok(());
        }

        let user = user.not_before(floor);
        let bot = bot.not_before(user.created_at());
        self.updated_at = Utc::now().max(bot.created_at());
        self.turns.push(user);
        self.turns.push(bot);
        Ok(())
    }

    /// Identifier of this conversation.
    #[must_use]
    pub fn id(&self) -> ConversationId {
        self.id
    }

    /// Topic derived from the seed turn.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Every turn in conversational order.
    #[must_use]
    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    /// Consumes the snapshot, returning its turns.
    #[must_use]
    pub fn into_turns(self) -> Vec<Message> {
        self.turns
    }

    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the last turn is a user turn with no reply.
    #[must_use]
    pub fn is_awaiting_reply(&self) -> bool {
        self.turns
            .last()
            .is_some_and(|m| m.role() == MessageRole::User)
    }

    /// The most recent user turn.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&Message> {
        self.turns.iter().rev().find(|m| m.role() == MessageRole::User)
    }

    /// The most recent bot turn.
    #[must_use]
    pub fn last_bot_message(&self) -> Option<&Message> {
        self.turns.iter().rev().find(|m| m.role() == MessageRole::Bot)
    }

    /// Renders the history as `role: text` lines.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|m| format!("{}: {}", m.role(), m.text()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn clamp_topic(topic: String) -> String {
    let topic = topic.trim();
    match topic.char_indices().nth(MAX_TOPIC_CHARS) {
        Some((cut, _)) => topic[..cut].to_string(),
        None => topic.to_string(),
    }
}

/// Checks the ordering rules for a full history.
///
/// Turn 0 is a user turn; every bot turn directly follows a user turn; two
/// user turns in a row are only allowed at positions 0 and 1 (an unanswered
/// seed); the history may end with an unanswered turn only when that turn
/// is the seed.
fn check_turn_order(turns: &[Message]) -> Result<(), ConversationError> {
    let Some(first) = turns.first() else {
        return Err(ConversationError::EmptyHistory);
    };
    if first.role() != MessageRole::User {
        return Err(ConversationError::UnexpectedRole {
            position: 0,
            expected: MessageRole::User,
            found: first.role(),
        });
    }

    for (position, pair) in turns.windows(2).enumerate() {
        let (prev, current) = (pair[0].role(), pair[1].role());
        match (prev, current) {
            (MessageRole::User, MessageRole::Bot) | (MessageRole::Bot, MessageRole::User) => {}
            (MessageRole::User, MessageRole::User) if position == 0 => {}
            (MessageRole::User, MessageRole::User) => {
                return Err(ConversationError::UnansweredTurn { position });
            }
            (MessageRole::Bot, MessageRole::Bot) => {
                return Err(ConversationError::UnexpectedRole {
                    position: position + 1,
                    expected: MessageRole::User,
                    found: MessageRole::Bot,
                });
            }
        }
    }

    let last = turns.len() - 1;
    if last > 0 && turns[last].role() == MessageRole::User {
        return Err(ConversationError::UnansweredTurn { position: last });
    }
    Ok(())
}
