//! In-memory store: useful for testing and ephemeral sessions.
//!
//! All state sits behind one `RwLock`, so every trait method applies as a
//! single atomic step just like the SQLite statements do.

use async_trait::async_trait;
use chrono::Utc;
use parley_core::error::StorageError;
use parley_core::message::{Candidate, CandidateId, Chat, ChatId, EditTarget, Message, MessageId};
use parley_core::store::{ChatStore, InsertedPair};
use parley_core::{CardData, Sender};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    chats: BTreeMap<ChatId, Chat>,
    messages: BTreeMap<MessageId, Message>,
    next_chat: i64,
    next_message: i64,
    next_candidate: i64,
}

impl State {
    fn push_message(&mut self, chat_id: ChatId, sender: Sender, text: &str) -> MessageId {
        self.next_message += 1;
        let id = MessageId(self.next_message);
        self.messages.insert(
            id,
            Message {
                id,
                chat_id,
                sender,
                text: text.to_string(),
                inserted_at: Utc::now(),
                prime_candidate_id: None,
                candidates: Vec::new(),
            },
        );
        id
    }
}

/// An in-memory chat store.
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_chat(&self, card: &CardData) -> Result<ChatId, StorageError> {
        let mut state = self.state.write().await;
        state.next_chat += 1;
        let id = ChatId(state.next_chat);
        state.chats.insert(
            id,
            Chat {
                id,
                card: card.clone(),
                created_at: Utc::now(),
            },
        );

        let greeting = card.character.greeting.trim();
        if !greeting.is_empty() {
            state.push_message(id, Sender::Character, greeting);
        }
        Ok(id)
    }

    async fn get_chat(&self, chat_id: ChatId) -> Result<Option<Chat>, StorageError> {
        Ok(self.state.read().await.chats.get(&chat_id).cloned())
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, StorageError> {
        Ok(self.state.read().await.chats.values().rev().cloned().collect())
    }

    async fn chat_exists(&self, chat_id: ChatId) -> Result<bool, StorageError> {
        Ok(self.state.read().await.chats.contains_key(&chat_id))
    }

    async fn fetch_before(
        &self,
        chat_id: ChatId,
        limit: usize,
        before: Option<MessageId>,
    ) -> Result<Vec<Message>, StorageError> {
        let state = self.state.read().await;
        let upper = before.unwrap_or(MessageId(i64::MAX));
        Ok(state
            .messages
            .range(..upper)
            .rev()
            .map(|(_, m)| m)
            .filter(|m| m.chat_id == chat_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_message(&self, message_id: MessageId) -> Result<Option<Message>, StorageError> {
        Ok(self.state.read().await.messages.get(&message_id).cloned())
    }

    async fn insert_pair(
        &self,
        chat_id: ChatId,
        user_text: &str,
        character_text: &str,
    ) -> Result<InsertedPair, StorageError> {
        let mut state = self.state.write().await;
        if !state.chats.contains_key(&chat_id) {
            return Err(StorageError::NotFound(format!("chat {chat_id}")));
        }
        let user_id = state.push_message(chat_id, Sender::User, user_text);
        let character_id = state.push_message(chat_id, Sender::Character, character_text);
        Ok(InsertedPair {
            user_id,
            character_id,
        })
    }

    async fn insert_candidate(
        &self,
        message_id: MessageId,
        text: &str,
    ) -> Result<CandidateId, StorageError> {
        let mut state = self.state.write().await;
        let id = CandidateId(state.next_candidate + 1);
        let message = state
            .messages
            .get_mut(&message_id)
            .ok_or_else(|| StorageError::NotFound(format!("message {message_id}")))?;
        message.candidates.push(Candidate {
            id,
            message_id,
            text: text.to_string(),
        });
        message.prime_candidate_id = Some(id);
        state.next_candidate = id.0;
        Ok(id)
    }

    async fn set_prime(
        &self,
        message_id: MessageId,
        candidate_id: Option<CandidateId>,
    ) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        let Some(message) = state.messages.get_mut(&message_id) else {
            return Ok(false);
        };
        match candidate_id {
            Some(id) if !message.owns_candidate(id) => Ok(false),
            other => {
                message.prime_candidate_id = other;
                Ok(true)
            }
        }
    }

    async fn update_text(&self, target: EditTarget, text: &str) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        match target {
            EditTarget::Message(id) => match state.messages.get_mut(&id) {
                Some(message) => {
                    message.text = text.to_string();
                    Ok(true)
                }
                None => Ok(false),
            },
            EditTarget::Candidate(id) => {
                let candidate = state
                    .messages
                    .values_mut()
                    .flat_map(|m| m.candidates.iter_mut())
                    .find(|c| c.id == id);
                match candidate {
                    Some(candidate) => {
                        candidate.text = text.to_string();
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
        }
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<bool, StorageError> {
        Ok(self.state.write().await.messages.remove(&message_id).is_some())
    }

    async fn delete_after(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<u64, StorageError> {
        let mut state = self.state.write().await;
        let before = state.messages.len();
        state
            .messages
            .retain(|id, m| m.chat_id != chat_id || *id <= message_id);
        Ok((before - state.messages.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_chat() -> (InMemoryStore, ChatId) {
        let store = InMemoryStore::new();
        let chat = store.create_chat(&CardData::named("Saku")).await.unwrap();
        (store, chat)
    }

    #[tokio::test]
    async fn fetch_before_is_newest_first_and_strict() {
        let (store, chat) = store_with_chat().await;
        let a = store.insert_pair(chat, "u1", "c1").await.unwrap();
        store.insert_pair(chat, "u2", "c2").await.unwrap();

        let page = store.fetch_before(chat, 3, None).await.unwrap();
        let texts: Vec<&str> = page.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["c2", "u2", "c1"]);

        let page = store.fetch_before(chat, 3, Some(a.character_id)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, a.user_id);
    }

    #[tokio::test]
    async fn insert_pair_into_missing_chat_fails() {
        let store = InMemoryStore::new();
        assert!(store.insert_pair(ChatId(9), "a", "b").await.is_err());
    }

    #[tokio::test]
    async fn candidate_lifecycle() {
        let (store, chat) = store_with_chat().await;
        let pair = store.insert_pair(chat, "Hey", "Hi").await.unwrap();
        let c1 = store.insert_candidate(pair.character_id, "Hello").await.unwrap();
        let c2 = store.insert_candidate(pair.character_id, "Yo").await.unwrap();
        assert_ne!(c1, c2);

        let msg = store.get_message(pair.character_id).await.unwrap().unwrap();
        assert_eq!(msg.canonical_text(), "Yo");

        assert!(store.set_prime(pair.character_id, Some(c1)).await.unwrap());
        assert!(!store.set_prime(pair.user_id, Some(c1)).await.unwrap());
        let msg = store.get_message(pair.character_id).await.unwrap().unwrap();
        assert_eq!(msg.canonical_text(), "Hello");
    }

    #[tokio::test]
    async fn rewind_is_scoped_to_chat() {
        let store = InMemoryStore::new();
        let a = store.create_chat(&CardData::named("A")).await.unwrap();
        let b = store.create_chat(&CardData::named("B")).await.unwrap();
        let cut = store.insert_pair(a, "a1", "a1r").await.unwrap();
        store.insert_pair(b, "b1", "b1r").await.unwrap();
        store.insert_pair(a, "a2", "a2r").await.unwrap();

        assert_eq!(store.delete_after(a, cut.character_id).await.unwrap(), 2);
        assert_eq!(store.fetch_before(a, 10, None).await.unwrap().len(), 2);
        assert_eq!(store.fetch_before(b, 10, None).await.unwrap().len(), 2);
    }
}
