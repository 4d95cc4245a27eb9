//! The persistence contract for debate conversations.
//!
//! `create` and `append_turns` are the only mutations. Implementations must
//! serialize `append_turns` per conversation id while letting different
//! conversations proceed in parallel, and a `get` racing an append observes
//! either the state before the pair or the state after it.

use crate::conversation::Conversation;
use crate::error::StoreError;
use crate::message::Message;
use async_trait::async_trait;
use contrarian_core::ConversationId;
use std::sync::Arc;

/// Durable storage for conversations.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persists a new conversation holding only `first_user_message`.
    ///
    /// The store allocates the id and derives the topic.
    async fn create(&self, first_user_message: Message) -> Result<Conversation, StoreError>;

    /// Loads the full history of a conversation.
    async fn get(&self, id: ConversationId) -> Result<Conversation, StoreError>;

    /// Appends `user_turn` then `bot_turn` as one atomic step.
    ///
    /// Passing the unanswered seed as `user_turn` answers it, adding only
    /// `bot_turn`. Returns the snapshot including the new turns.
    async fn append_turns(
        &self,
        id: ConversationId,
        user_turn: Message,
        bot_turn: Message,
    ) -> Result<Conversation, StoreError>;
}

#[async_trait]
impl<S: ConversationStore + ?Sized> ConversationStore for Arc<S> {
    async fn create(&self, first_user_message: Message) -> Result<Conversation, StoreError> {
        (**self).create(first_user_message).await
    }

    async fn get(&self, id: ConversationId) -> Result<Conversation, StoreError> {
        (**self).get(id).await
    }

    async fn append_turns(
        &self,
        id: ConversationId,
        user_turn: Message,
        bot_turn: Message,
    ) -> Result<Conversation, StoreError> {
        (**self).append_turns(id, user_turn, bot_turn).await
    }
}
