//! In-process conversation store.
//!
//! Each conversation sits behind its own `RwLock`. The outer map lock is held
//! only long enough to look up or insert an entry, so appends to one
//! conversation never wait on another.

use crate::conversation::Conversation;
use crate::error::StoreError;
use crate::message::Message;
use crate::store::ConversationStore;
use crate::topic::{TopicDeriver, TruncatedTopic};
use async_trait::async_trait;
use contrarian_core::ConversationId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type Entry = Arc<RwLock<Conversation>>;

/// A `ConversationStore` kept in memory for the life of the process.
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, Entry>>,
    topics: Arc<dyn TopicDeriver>,
}

impl InMemoryConversationStore {
    /// Creates an empty store using [`TruncatedTopic::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_topic_deriver(TruncatedTopic::default())
    }

    /// Creates an empty store with a custom topic rule.
    #[must_use]
    pub fn with_topic_deriver(topics: impl TopicDeriver + 'static) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            topics: Arc::new(topics),
        }
    }

    /// Number of conversations held.
    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn entry(&self, id: ConversationId) -> Result<Entry, StoreError> {
        self.conversations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryConversationStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn create(&self, first_user_message: Message) -> Result<Conversation, StoreError> {
        let topic = self.topics.derive(first_user_message.text());
        let conversation = Conversation::start(first_user_message, topic)?;
        let id = conversation.id();

        self.conversations
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(conversation.clone())));

        debug!(conversation_id = %id, "created conversation");
        Ok(conversation)
    }

    async fn get(&self, id: ConversationId) -> Result<Conversation, StoreError> {
        let entry = self.entry(id).await?;
        let snapshot = entry.read().await.clone();
        Ok(snapshot)
    }

    async fn append_turns(
        &self,
        id: ConversationId,
        user_turn: Message,
        bot_turn: Message,
    ) -> Result<Conversation, StoreError> {
        let entry = self.entry(id).await?;
        let mut conversation = entry.write().await;
        conversation.append_pair(user_turn, bot_turn)?;

        debug!(
            conversation_id = %id,
            turns = conversation.turn_count(),
            "appended turn pair"
        );
        Ok(conversation.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageRole;
    use std::time::Duration;

    fn user(text: &str) -> Message {
        Message::user(text).expect("valid")
    }

    fn bot(text: &str) -> Message {
        Message::bot(text).expect("valid")
    }

    #[tokio::test]
    async fn create_then_get_round_trips_the_seed() {
        let store = InMemoryConversationStore::new();
        let seed = user("The sky is blue");

        let created = store.create(seed.clone()).await.expect("create");
        let fetched = store.get(created.id()).await.expect("get");

        assert_eq!(fetched.turns(), std::slice::from_ref(&seed));
        assert_eq!(fetched.topic(), "The sky is blue");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn topic_comes_from_the_configured_deriver() {
        let store = InMemoryConversationStore::with_topic_deriver(TruncatedTopic::new(10));
        let created = store
            .create(user("Remote work beats the office"))
            .await
            .expect("create");
        assert_eq!(created.topic(), "Remote...");
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let store = InMemoryConversationStore::new();
        let id = ConversationId::new();
        assert_eq!(store.get(id).await.unwrap_err(), StoreError::NotFound { id });
    }

    #[tokio::test]
    async fn append_to_unknown_is_not_found() {
        let store = InMemoryConversationStore::new();
        let id = ConversationId::new();
        let err = store
            .append_turns(id, user("a"), bot("b"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound { id });
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn append_adds_exactly_two_turns() {
        let store = InMemoryConversationStore::new();
        let created = store.create(user("seed")).await.expect("create");
        let seed = created.turns()[0].clone();
        let answered = store
            .append_turns(created.id(), seed, bot("reply"))
            .await
            .expect("answer seed");
        assert_eq!(answered.turn_count(), 2);

        let after = store
            .append_turns(created.id(), user("next"), bot("rebuttal"))
            .await
            .expect("append");
        assert_eq!(after.turn_count(), answered.turn_count() + 2);
        assert_eq!(store.get(created.id()).await.expect("get"), after);
    }

    #[tokio::test]
    async fn rejected_pair_leaves_history_untouched() {
        let store = InMemoryConversationStore::new();
        let created = store.create(user("seed")).await.expect("create");

        let err = store
            .append_turns(created.id(), bot("wrong"), user("order"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTurns(_)));
        assert_eq!(store.get(created.id()).await.expect("get"), created);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_never_interleave() {
        let store = Arc::new(InMemoryConversationStore::new());
        let created = store.create(user("seed")).await.expect("create");
        let seed = created.turns()[0].clone();
        store
            .append_turns(created.id(), seed, bot("opening"))
            .await
            .expect("answer seed");

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                let id = created.id();
                tokio::spawn(async move {
                    store
                        .append_turns(id, user(&format!("claim {i}")), bot(&format!("counter {i}")))
                        .await
                })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.expect("join").expect("append");
        }

        let turns = store.get(created.id()).await.expect("get").into_turns();
        assert_eq!(turns.len(), 2 + 32 * 2);
        for pair in turns[2..].chunks(2) {
            assert_eq!(pair[0].role(), MessageRole::User);
            assert_eq!(pair[1].role(), MessageRole::Bot);
            let claim = pair[0].text().trim_start_matches("claim ");
            let counter = pair[1].text().trim_start_matches("counter ");
            assert_eq!(claim, counter);
        }
    }

    #[tokio::test]
    async fn appends_to_other_conversations_do_not_wait() {
        let store = InMemoryConversationStore::new();
        let a = store.create(user("a")).await.expect("create a");
        let b = store.create(user("b")).await.expect("create b");

        let entry_a = store.entry(a.id()).await.expect("entry");
        let _held = entry_a.write().await;

        let appended = tokio::time::timeout(
            Duration::from_secs(1),
            store.append_turns(b.id(), user("b2"), bot("b3")),
        )
        .await
        .expect("append to b must not block on a")
        .expect("append");
        assert_eq!(appended.turn_count(), 3);
    }
}
