//! Conversation model and persistence contract for the debate service.
//!
//! This crate provides:
//!
//! - **Model**: immutable turns and the append-only conversation history
//! - **Topic derivation**: pluggable rules for naming a new conversation
//! - **Store**: the `ConversationStore` contract and an in-process implementation

pub mod conversation;
pub mod error;
pub mod memory;
pub mod message;
pub mod store;
pub mod topic;

pub use conversation::{Conversation, MAX_TOPIC_CHARS};
pub use error::{ConversationError, StoreError};
pub use memory::InMemoryConversationStore;
pub use message::{MAX_MESSAGE_CHARS, Message, MessageRole};
pub use store::ConversationStore;
pub use topic::{TopicDeriver, TruncatedTopic};
