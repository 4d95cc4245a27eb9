//! Shared foundation for the contrarian debate service.
//!
//! Holds the strongly-typed identifiers that cross crate boundaries and the
//! `Result` alias used at the orchestration boundary.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ConversationId, MessageId, ParseIdError};
