//! Completion providers for the debate service.
//!
//! This crate provides:
//!
//! - **Provider contract**: `CompletionProvider`, taking a stance and the debate history
//! - **Prompting**: the default debater `Stance` and chat-message layout
//! - **Retry**: `RetryPolicy` and `complete_with_retry`, with per-attempt deadlines
//! - **Adapters**: an OpenAI-compatible HTTP provider
//! - **Testing**: a scripted provider, behind the `test-util` feature

pub mod backend;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod retry;

pub use backend::{ChatTurn, CompletionProvider, CompletionRequest, Speaker};
pub use error::{FailureKind, ProviderError, RetryExhausted};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{Outcome, ScriptedProvider};
pub use openai::{OpenAiCompatibleProvider, OpenAiConfig};
pub use prompt::{ChatMessage, ChatRole, Stance};
pub use retry::{Completion, RetryPolicy, complete_with_retry};
