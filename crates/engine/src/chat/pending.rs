//! Optimistic local state.
//!
//! A pending turn is the user's message shown before the provider has
//! answered. It is a two-phase entry: `apply` makes it visible, then exactly
//! one of `commit` (the pair was persisted) or `retract` (the send failed,
//! the text goes back to the caller) removes it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use parley_core::ChatId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PendingId(pub u64);

/// A tentatively applied user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTurn {
    pub id: PendingId,
    pub chat_id: ChatId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PendingTurns {
    turns: Mutex<HashMap<ChatId, Vec<PendingTurn>>>,
    next_id: AtomicU64,
}

impl PendingTurns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `text` as a pending user turn of the chat.
    pub fn apply(&self, chat_id: ChatId, text: &str) -> PendingId {
        let id = PendingId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.lock().entry(chat_id).or_default().push(PendingTurn {
            id,
            chat_id,
            text: text.to_string(),
            created_at: Utc::now(),
        });
        id
    }

    /// The persisted pair now stands in for the turn; drop the local copy.
    pub fn commit(&self, chat_id: ChatId, id: PendingId) -> Option<PendingTurn> {
        self.take(chat_id, id)
    }

    /// Remove the turn and hand its text back.
    pub fn retract(&self, chat_id: ChatId, id: PendingId) -> Option<String> {
        self.take(chat_id, id).map(|turn| turn.text)
    }

    /// Pending turns of a chat in the order they were applied.
    pub fn snapshot(&self, chat_id: ChatId) -> Vec<PendingTurn> {
        self.lock().get(&chat_id).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self, chat_id: ChatId) -> bool {
        self.lock().get(&chat_id).is_none_or(|turns| turns.is_empty())
    }

    fn take(&self, chat_id: ChatId, id: PendingId) -> Option<PendingTurn> {
        let mut turns = self.lock();
        let list = turns.get_mut(&chat_id)?;
        let index = list.iter().position(|t| t.id == id)?;
        let turn = list.remove(index);
        if list.is_empty() {
            turns.remove(&chat_id);
        }
        Some(turn)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChatId, Vec<PendingTurn>>> {
        self.turns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_then_commit() {
        let pending = PendingTurns::new();
        let id = pending.apply(ChatId(1), "Hello");
        assert_eq!(pending.snapshot(ChatId(1)).len(), 1);

        let turn = pending.commit(ChatId(1), id).unwrap();
        assert_eq!(turn.text, "Hello");
        assert!(pending.is_empty(ChatId(1)));
    }

    #[test]
    fn retract_returns_text() {
        let pending = PendingTurns::new();
        let id = pending.apply(ChatId(1), "Don't lose me");
        assert_eq!(pending.retract(ChatId(1), id).as_deref(), Some("Don't lose me"));
        assert!(pending.snapshot(ChatId(1)).is_empty());
    }

    #[test]
    fn second_resolution_is_none() {
        let pending = PendingTurns::new();
        let id = pending.apply(ChatId(1), "x");
        pending.commit(ChatId(1), id);
        assert!(pending.retract(ChatId(1), id).is_none());
    }

    #[test]
    fn chats_do_not_share_entries() {
        let pending = PendingTurns::new();
        let a = pending.apply(ChatId(1), "a");
        pending.apply(ChatId(2), "b");
        assert!(pending.retract(ChatId(2), a).is_none());
        assert_eq!(pending.snapshot(ChatId(2))[0].text, "b");
    }
}
