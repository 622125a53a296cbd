//! Branching message model: send, regenerate, prime selection, edits,
//! rewinds and deletes, under a per-chat generation guard.

pub mod engine;
pub mod guard;
pub mod pending;

pub use engine::{ChatEngine, GenerationSettings, Outcome, Regenerated, SendFailure, SentPair};
pub use guard::{GenerationGuard, GenerationPermit};
pub use pending::{PendingId, PendingTurn, PendingTurns};
