//! Database-backed storage.

pub mod conversation;

pub use conversation::PgConversationStore;
