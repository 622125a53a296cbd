//! Per-chat "generation in flight" guard.
//!
//! At most one send or regenerate runs per chat. A second caller gets no
//! permit and the operation becomes a no-op; nothing is queued.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use parley_core::ChatId;

#[derive(Debug, Clone, Default)]
pub struct GenerationGuard {
    active: Arc<Mutex<HashSet<ChatId>>>,
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the chat. `None` when a generation is already running for it.
    pub fn try_acquire(&self, chat_id: ChatId) -> Option<GenerationPermit> {
        if lock(&self.active).insert(chat_id) {
            Some(GenerationPermit {
                chat_id,
                active: Arc::clone(&self.active),
            })
        } else {
            None
        }
    }

    pub fn is_generating(&self, chat_id: ChatId) -> bool {
        lock(&self.active).contains(&chat_id)
    }
}

/// Held for the duration of one generation; releases the chat on drop.
#[derive(Debug)]
pub struct GenerationPermit {
    chat_id: ChatId,
    active: Arc<Mutex<HashSet<ChatId>>>,
}

impl GenerationPermit {
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

impl Drop for GenerationPermit {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.chat_id);
    }
}

// A panic while holding the set cannot leave it inconsistent.
fn lock(set: &Mutex<HashSet<ChatId>>) -> MutexGuard<'_, HashSet<ChatId>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
