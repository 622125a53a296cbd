//! # Parley Engine
//!
//! The conversational context engine behind every generation:
//!
//! 1. **Budget** the model's token limit between the system prompt, the
//!    latest user message and history
//! 2. **Fetch** the newest history that fits, page by page
//! 3. **Normalize** roles so the payload starts with `user` and alternates
//! 4. **Render** the system prompt from the character card and persona
//! 5. **Write back** the reply as a new message pair or a prime candidate
//!
//! Storage and model providers are reached only through the `ChatStore`
//! and `Provider` traits from `parley-core`.

pub mod chat;
pub mod context;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use chat::{
    ChatEngine, GenerationGuard, GenerationSettings, Outcome, PendingTurns, Regenerated,
    SendFailure, SentPair,
};
pub use context::{
    AssembledContext, AssemblyInput, AssemblyMetadata, BEGIN_CONVERSATION, CharacterMemory,
    ContextAssembler, HeuristicTokenizer, NoCharacterMemory, PromptVariant, WindowStop,
    tokenizer_for_model,
};
