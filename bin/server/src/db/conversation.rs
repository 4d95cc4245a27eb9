//! Postgres-backed conversation store.
//!
//! Appends lock the conversation row with `SELECT ... FOR UPDATE`, so two
//! appends to the same conversation commit one after the other while
//! appends to different conversations never wait on each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contrarian_conversation::{
    Conversation, ConversationStore, Message, MessageRole, StoreError, TopicDeriver,
    TruncatedTopic,
};
use contrarian_core::{ConversationId, MessageId};
use sqlx::{FromRow, PgConnection, PgPool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

/// Row type for conversation queries.
#[derive(FromRow)]
struct ConversationRow {
    id: String,
    topic: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationRow {
    fn try_into_conversation(self, turns: Vec<Message>) -> Result<Conversation, StoreError> {
        let id = ConversationId::from_str(&self.id).map_err(|e| {
            StoreError::unavailable(format!("invalid conversation id '{}': {e}", self.id))
        })?;
        Ok(Conversation::restore(
            id,
            self.topic,
            turns,
            self.created_at,
            self.updated_at,
        )?)
    }
}

/// Row type for message queries.
#[derive(FromRow)]
struct MessageRow {
    id: String,
    role: String,
    text: String,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn try_into_message(self) -> Result<Message, StoreError> {
        let id = MessageId::from_str(&self.id).map_err(|e| {
            StoreError::unavailable(format!("invalid message id '{}': {e}", self.id))
        })?;
        let role = MessageRole::from_str(&self.role).map_err(StoreError::unavailable)?;
        Ok(Message::restore(id, role, self.text, self.created_at)?)
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::unavailable(e)
}

/// A `ConversationStore` persisted in PostgreSQL.
pub struct PgConversationStore {
    pool: PgPool,
    topics: Arc<dyn TopicDeriver>,
}

impl PgConversationStore {
    /// Creates a store using [`TruncatedTopic::default`].
    pub fn new(pool: PgPool) -> Self {
        Self::with_topic_deriver(pool, TruncatedTopic::default())
    }

    /// Creates a store with a custom topic rule.
    pub fn with_topic_deriver(pool: PgPool, topics: impl TopicDeriver + 'static) -> Self {
        Self {
            pool,
            topics: Arc::new(topics),
        }
    }
}

async fn fetch_messages(
    conn: &mut PgConnection,
    id: ConversationId,
) -> Result<Vec<Message>, StoreError> {
    let rows: Vec<MessageRow> = sqlx::query_as(
        r#"
        SELECT id, role, text, created_at
        FROM conversation_messages
        WHERE conversation_id = $1
        ORDER BY position
        "#,
    )
    .bind(id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;

    rows.into_iter().map(MessageRow::try_into_message).collect()
}

async fn insert_message(
    conn: &mut PgConnection,
    id: ConversationId,
    position: usize,
    message: &Message,
) -> Result<(), StoreError> {
    let position = i32::try_from(position)
        .map_err(|_| StoreError::unavailable(format!("turn position {position} out of range")))?;
    sqlx::query(
        r#"
        INSERT INTO conversation_messages (id, conversation_id, position, role, text, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(message.id().to_string())
    .bind(id.to_string())
    .bind(position)
    .bind(message.role().as_str())
    .bind(message.text())
    .bind(message.created_at())
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    #[instrument(skip_all)]
    async fn create(&self, first_user_message: Message) -> Result<Conversation, StoreError> {
        let topic = self.topics.derive(first_user_message.text());
        let conversation = Conversation::start(first_user_message, topic)?;
        let id = conversation.id();

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            r#"
            INSERT INTO conversations (id, topic, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id.to_string())
        .bind(conversation.topic())
        .bind(conversation.created_at())
        .bind(conversation.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        for (position, message) in conversation.turns().iter().enumerate() {
            insert_message(&mut tx, id, position, message).await?;
        }
        tx.commit().await.map_err(db_error)?;

        tracing::debug!(conversation_id = %id, "created conversation");
        Ok(conversation)
    }

    #[instrument(skip(self), fields(conversation_id = %id))]
    async fn get(&self, id: ConversationId) -> Result<Conversation, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let row: Option<ConversationRow> = sqlx::query_as(
            r#"
            SELECT id, topic, created_at, updated_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;
        let row = row.ok_or(StoreError::NotFound { id })?;

        let turns = fetch_messages(&mut tx, id).await?;
        tx.commit().await.map_err(db_error)?;
        row.try_into_conversation(turns)
    }

    #[instrument(skip(self, user_turn, bot_turn), fields(conversation_id = %id))]
    async fn append_turns(
        &self,
        id: ConversationId,
        user_turn: Message,
        bot_turn: Message,
    ) -> Result<Conversation, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let row: Option<ConversationRow> = sqlx::query_as(
            r#"
            SELECT id, topic, created_at, updated_at
            FROM conversations
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;
        let row = row.ok_or(StoreError::NotFound { id })?;

        let turns = fetch_messages(&mut tx, id).await?;
        let mut conversation = row.try_into_conversation(turns)?;
        let stored = conversation.turn_count();
        conversation.append_pair(user_turn, bot_turn)?;

        for (position, message) in conversation.turns().iter().enumerate().skip(stored) {
            insert_message(&mut tx, id, position, message).await?;
        }
        sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(conversation.updated_at())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        tracing::debug!(turns = conversation.turn_count(), "appended turn pair");
        Ok(conversation)
    }
}
