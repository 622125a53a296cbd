//! # Parley Core
//!
//! Domain types, collaborator traits, and error definitions for the Parley
//! roleplay chat client. It depends only on serialization, error and async
//! trait helpers, and defines the model that the store, engine and provider
//! crates implement against.
//!
//! Every external collaborator (storage, model provider, tokenizer) is a
//! trait here so the engine can be driven by real backends or by test
//! doubles alike.

pub mod card;
pub mod error;
pub mod message;
pub mod provider;
pub mod store;
pub mod tokenizer;

// Re-export key types at crate root for ergonomics
pub use card::{CardData, Character, PersonaData, World};
pub use error::{ContextError, Error, ProviderError, Result, StorageError};
pub use message::{
    Candidate, CandidateId, Chat, ChatId, Context, EditTarget, Message, MessageId,
    ParseSenderError, ProviderMessage, Role, Sender,
};
pub use provider::{Provider, ProviderRequest};
pub use store::{ChatStore, InsertedPair};
pub use tokenizer::{MIN_HISTORY_TOKENS, Tokenizer};
