//! Tokenizer capability.
//!
//! The engine only guarantees budget conformance under whichever counter it
//! is handed; it never assumes counts match the provider's own tokenizer.

/// Tokens that must remain for history once the system prompt and the
/// latest user message are reserved. Fixed policy, not configurable.
pub const MIN_HISTORY_TOKENS: usize = 300;

/// Counts tokens for one model. Must be pure and deterministic.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

impl<T: Tokenizer + ?Sized> Tokenizer for std::sync::Arc<T> {
    fn count_tokens(&self, text: &str) -> usize {
        (**self).count_tokens(text)
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for Box<T> {
    fn count_tokens(&self, text: &str) -> usize {
        (**self).count_tokens(text)
    }
}
