//! Chat storage trait: persisted chats, messages and candidates.
//!
//! The engine never touches a database directly; every read and write goes
//! through a `ChatStore`. Implementations must give each method
//! single-statement (or single-transaction) atomicity: a caller never
//! observes half of a cascade delete or a candidate without its prime
//! pointer update.

use async_trait::async_trait;

use crate::card::CardData;
use crate::error::StorageError;
use crate::message::{CandidateId, Chat, ChatId, EditTarget, Message, MessageId};

/// Ids assigned to a freshly persisted user/character pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedPair {
    pub user_id: MessageId,
    pub character_id: MessageId,
}

/// The core ChatStore trait.
///
/// Implementations: SQLite, in-memory (for testing).
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Create a chat for a card. A non-empty greeting is seeded as the
    /// first `character` message.
    async fn create_chat(&self, card: &CardData) -> Result<ChatId, StorageError>;

    async fn get_chat(&self, chat_id: ChatId) -> Result<Option<Chat>, StorageError>;

    async fn list_chats(&self) -> Result<Vec<Chat>, StorageError>;

    async fn chat_exists(&self, chat_id: ChatId) -> Result<bool, StorageError>;

    /// Up to `limit` messages of a chat, newest first, strictly older than
    /// `before` when given. Messages carry their candidates.
    async fn fetch_before(
        &self,
        chat_id: ChatId,
        limit: usize,
        before: Option<MessageId>,
    ) -> Result<Vec<Message>, StorageError>;

    async fn get_message(&self, message_id: MessageId) -> Result<Option<Message>, StorageError>;

    /// Persist a user turn and its character reply together.
    async fn insert_pair(
        &self,
        chat_id: ChatId,
        user_text: &str,
        character_text: &str,
    ) -> Result<InsertedPair, StorageError>;

    /// Append a candidate to a message and make it the prime candidate,
    /// in one transaction.
    async fn insert_candidate(
        &self,
        message_id: MessageId,
        text: &str,
    ) -> Result<CandidateId, StorageError>;

    /// Point a message at one of its own candidates, or clear the pointer
    /// with `None`. Returns `false` without changing anything when the
    /// candidate does not belong to the message.
    async fn set_prime(
        &self,
        message_id: MessageId,
        candidate_id: Option<CandidateId>,
    ) -> Result<bool, StorageError>;

    /// Replace the text of a message or candidate. Returns `false` when the
    /// target does not exist.
    async fn update_text(&self, target: EditTarget, text: &str) -> Result<bool, StorageError>;

    /// Delete one message and its candidates. Returns `false` when absent.
    async fn delete_message(&self, message_id: MessageId) -> Result<bool, StorageError>;

    /// Delete every message of the chat with an id greater than `message_id`,
    /// with their candidates, as one atomic operation. Returns the number of
    /// messages removed.
    async fn delete_after(&self, chat_id: ChatId, message_id: MessageId)
    -> Result<u64, StorageError>;
}
