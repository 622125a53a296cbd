//! Context assembly pipeline.
//!
//! Builds the provider payload for one generation:
//!
//! 1. **Character memory** is recalled for the chat
//! 2. **System prompt** is rendered from card, persona, memory and jailbreak
//! 3. **Budget**: system + latest user message are counted; history gets the rest
//! 4. **History window** is fetched newest-first until the budget is spent
//! 5. **Normalization** makes roles start with `user` and alternate
//!
//! The budget check in step 3 happens before any history is read.
//!
//! # Determinism
//!
//! Identical store contents and inputs always produce identical contexts.
//! Nothing here is random or time-dependent.

use std::sync::Arc;

use parley_core::{
    CardData, ChatId, ChatStore, Context, MessageId, PersonaData, ProviderMessage, Result,
    Tokenizer,
};
use serde::Serialize;
use tracing::debug;

use crate::context::budget::{self, HistoryBudget};
use crate::context::history::{self, WindowStop};
use crate::context::memory::{CharacterMemory, NoCharacterMemory};
use crate::context::normalize;
use crate::context::template::{self, PromptVariant, SystemPromptParams};

/// All inputs required by the assembler for a single provider call.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    pub chat_id: ChatId,
    /// The user text this generation answers. Never persisted by assembly.
    pub latest_user_message: &'a str,
    pub card: &'a CardData,
    pub persona: &'a PersonaData,
    pub jailbreak: &'a str,
    pub variant: PromptVariant,
    pub token_limit: usize,
    /// Only history strictly older than this message is considered.
    pub before: Option<MessageId>,
}

/// The assembled context, ready for a provider call.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub context: Context,
    pub metadata: AssemblyMetadata,
}

/// Token accounting for one assembly.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyMetadata {
    pub system_tokens: usize,
    pub user_tokens: usize,
    pub history_tokens: usize,
    pub token_limit: usize,
    /// History budget after system prompt and latest message.
    pub remaining: usize,
    pub messages_included: usize,
    pub pages_fetched: usize,
    pub stop: WindowStop,
    /// Budget utilization percentage (0.0–100.0).
    pub utilization_pct: f32,
}

/// Assembles contexts against a store.
#[derive(Clone)]
pub struct ContextAssembler {
    tokenizer: Arc<dyn Tokenizer>,
    memory: Arc<dyn CharacterMemory>,
}

impl ContextAssembler {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            memory: Arc::new(NoCharacterMemory),
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn CharacterMemory>) -> Self {
        self.memory = memory;
        self
    }

    /// Swap the tokenizer, keeping the configured memory.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// Run the full pipeline.
    pub async fn assemble(
        &self,
        store: &dyn ChatStore,
        input: AssemblyInput<'_>,
    ) -> Result<AssembledContext> {
        let character_memory = self.memory.recall(input.chat_id).await?;

        let system = template::render_system_prompt(&SystemPromptParams {
            card: input.card,
            persona: input.persona,
            character_memory: &character_memory,
            jailbreak: input.jailbreak,
            variant: input.variant,
        })?;

        let HistoryBudget {
            system_tokens,
            user_tokens,
            token_limit,
            remaining,
        } = budget::allocate(
            self.tokenizer.count_tokens(&system),
            self.tokenizer.count_tokens(input.latest_user_message),
            input.token_limit,
        )?;

        let window = history::fetch_window(
            store,
            self.tokenizer.as_ref(),
            input.chat_id,
            remaining,
            input.before,
        )
        .await?;

        let history: Vec<ProviderMessage> =
            window.messages.iter().map(ProviderMessage::from).collect();
        let messages = normalize::normalize(history, input.latest_user_message);

        let used = system_tokens + user_tokens + window.tokens;
        let metadata = AssemblyMetadata {
            system_tokens,
            user_tokens,
            history_tokens: window.tokens,
            token_limit,
            remaining,
            messages_included: window.messages.len(),
            pages_fetched: window.pages,
            stop: window.stop,
            utilization_pct: if token_limit > 0 {
                (used as f32 / token_limit as f32) * 100.0
            } else {
                0.0
            },
        };

        debug!(
            chat = %input.chat_id,
            system_tokens,
            user_tokens,
            history_tokens = window.tokens,
            messages = metadata.messages_included,
            pages = window.pages,
            stop = ?window.stop,
            "Context assembled"
        );

        Ok(AssembledContext {
            context: Context { system, messages },
            metadata,
        })
    }
}
