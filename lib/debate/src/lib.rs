//! Debate orchestration.
//!
//! `DebateOrchestrator` turns a user message into an answered turn pair:
//! it resolves the conversation, asks the completion provider for a
//! rebuttal under a retry policy, and commits both turns in one append.

pub mod error;
pub mod orchestrator;
pub mod request;

pub use error::{DebateError, DebateErrorKind, DebatePhase};
pub use orchestrator::DebateOrchestrator;
pub use request::{DebateReply, DebateRequest, TurnView};
