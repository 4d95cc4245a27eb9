//! The debate orchestrator.
//!
//! Each request moves through four phases:
//! 1. Validate the text and build the pending user turn
//! 2. Resolve the conversation: create it (persisting the seed) or load it
//! 3. Generate the rebuttal under the retry policy
//! 4. Persist the (user, bot) pair in one append
//!
//! Nothing but the seed is written before a reply exists, so a failed or
//! cancelled request leaves an existing history untouched. Step 4 runs on
//! its own task and finishes even if the caller goes away.

use crate::error::{DebateError, DebatePhase};
use crate::request::DebateRequest;
use contrarian_ai::{
    ChatTurn, CompletionProvider, CompletionRequest, FailureKind, ProviderError, RetryPolicy,
    Stance, complete_with_retry,
};
use contrarian_conversation::{
    Conversation, ConversationStore, MAX_MESSAGE_CHARS, Message, MessageRole, StoreError,
};
use contrarian_core::{ConversationId, Result};
use rootcause::Report;
use std::sync::Arc;
use tracing::{Span, debug, field, instrument, warn};

/// Drives debate requests against a store and a completion provider.
pub struct DebateOrchestrator<S, P> {
    store: Arc<S>,
    provider: P,
    stance: Stance,
    retry: RetryPolicy,
}

impl<S, P> DebateOrchestrator<S, P>
where
    S: ConversationStore + 'static,
    P: CompletionProvider,
{
    /// Creates an orchestrator with the default stance and retry policy.
    pub fn new(store: S, provider: P) -> Self {
        Self {
            store: Arc::new(store),
            provider,
            stance: Stance::default(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_stance(mut self, stance: Stance) -> Self {
        self.stance = stance;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Handles a [`DebateRequest`].
    ///
    /// # Errors
    ///
    /// See [`DebateOrchestrator::handle_message`].
    pub async fn handle(&self, request: &DebateRequest) -> Result<Conversation, DebateError> {
        self.handle_message(request.conversation_id.as_deref(), &request.message)
            .await
    }

    /// Answers `text`, starting a new conversation when `conversation_id`
    /// is `None`, and returns the updated snapshot.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the text is blank or too long
    /// - `ConversationNotFound` if the identifier does not resolve
    /// - `StoreUnavailable` if the conversation cannot be created or loaded
    /// - `GenerationFailed` once the retry policy gives up
    /// - `PersistenceFailed` if the answered pair cannot be stored
    #[instrument(
        skip(self, text),
        fields(conversation_id = conversation_id.unwrap_or("new"), chars = text.len())
    )]
    pub async fn handle_message(
        &self,
        conversation_id: Option<&str>,
        text: &str,
    ) -> Result<Conversation, DebateError> {
        let user_turn =
            Message::user(text).map_err(|reason| fail(DebateError::InvalidInput { reason }))?;

        debug!(phase = %DebatePhase::Resolving, "resolving conversation");
        let conversation = match conversation_id {
            None => {
                let created = self
                    .store
                    .create(user_turn.clone())
                    .await
                    .map_err(|e| fail(DebateError::resolving(e)))?;
                Span::current().record("conversation_id", field::display(created.id()));
                created
            }
            Some(raw) => self.load(raw).await?,
        };

        debug!(
            phase = %DebatePhase::Generating,
            turns = conversation.turn_count(),
            "generating rebuttal"
        );
        let request = self.completion_request(&conversation, &user_turn);
        let completion = complete_with_retry(&self.provider, &request, &self.retry)
            .await
            .map_err(|exhausted| {
                fail(DebateError::GenerationFailed {
                    conversation_id: conversation.id(),
                    attempts: exhausted.attempts,
                    last: exhausted.last,
                })
            })?;
        let bot_turn = Message::bot(clip_reply(&completion.text)).map_err(|e| {
            fail(DebateError::GenerationFailed {
                conversation_id: conversation.id(),
                attempts: completion.attempts,
                last: ProviderError::failed(FailureKind::MalformedResponse, e.to_string()),
            })
        })?;

        debug!(
            phase = %DebatePhase::Persisting,
            attempts = completion.attempts,
            "persisting turn pair"
        );
        let updated = self.persist(conversation.id(), user_turn, bot_turn).await?;

        debug!(turns = updated.turn_count(), "debate turn complete");
        Ok(updated)
    }

    /// Looks up a conversation by its identifier.
    ///
    /// # Errors
    ///
    /// Returns `ConversationNotFound` or `StoreUnavailable`.
    #[instrument(skip(self))]
    pub async fn conversation(&self, conversation_id: &str) -> Result<Conversation, DebateError> {
        self.load(conversation_id).await
    }

    async fn load(&self, raw: &str) -> Result<Conversation, DebateError> {
        let id: ConversationId = raw.parse().map_err(|_| {
            fail(DebateError::ConversationNotFound {
                id: raw.to_string(),
            })
        })?;
        self.store
            .get(id)
            .await
            .map_err(|e| fail(DebateError::resolving(e)))
    }

    async fn persist(
        &self,
        id: ConversationId,
        user_turn: Message,
        bot_turn: Message,
    ) -> Result<Conversation, DebateError> {
        let store = Arc::clone(&self.store);
        let append =
            tokio::spawn(async move { store.append_turns(id, user_turn, bot_turn).await });

        let outcome = match append.await {
            Ok(outcome) => outcome,
            Err(join) => Err(StoreError::unavailable(format!("append task failed: {join}"))),
        };
        outcome.map_err(|reason| {
            fail(DebateError::PersistenceFailed {
                conversation_id: id,
                reason,
            })
        })
    }

    /// The stance, the stored history, and the pending turn if it is not
    /// already stored (it is, as the seed, on the create path).
    fn completion_request(&self, conversation: &Conversation, pending: &Message) -> CompletionRequest {
        let mut history: Vec<ChatTurn> = conversation.turns().iter().map(chat_turn).collect();
        if conversation.turns().iter().all(|m| m.id() != pending.id()) {
            history.push(chat_turn(pending));
        }
        self.stance.request().with_history(history)
    }
}

impl<S, P> std::fmt::Debug for DebateOrchestrator<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebateOrchestrator")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn chat_turn(message: &Message) -> ChatTurn {
    match message.role() {
        MessageRole::User => ChatTurn::user(message.text()),
        MessageRole::Bot => ChatTurn::opponent(message.text()),
    }
}

fn clip_reply(text: &str) -> &str {
    let text = text.trim();
    match text.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((cut, _)) => text[..cut].trim_end(),
        None => text,
    }
}

fn fail(error: DebateError) -> Report<DebateError> {
    warn!(
        phase = %error.phase(),
        kind = %error.kind(),
        error = %error,
        "debate request failed"
    );
    error.into()
}
