//! Character memory: long-running summary text injected into the prompt.

use async_trait::async_trait;
use parley_core::{ChatId, Result};

/// Source of the "Character Memory" prompt section for a chat.
#[async_trait]
pub trait CharacterMemory: Send + Sync {
    /// The memory text for a chat. Empty when there is nothing to recall.
    async fn recall(&self, chat_id: ChatId) -> Result<String>;
}

/// Recalls nothing. The memory section is then left out of the prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCharacterMemory;

#[async_trait]
impl CharacterMemory for NoCharacterMemory {
    async fn recall(&self, _chat_id: ChatId) -> Result<String> {
        Ok(String::new())
    }
}
