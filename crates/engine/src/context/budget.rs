//! Token budget allocation.
//!
//! The system prompt and the latest user message are mandatory; history
//! gets whatever is left of the model's token limit. If that leftover is
//! below `MIN_HISTORY_TOKENS` the request is refused before any history is
//! read, since such a turn would be a poor generation anyway.

use parley_core::{ContextError, MIN_HISTORY_TOKENS};
use serde::Serialize;

/// Result of a successful allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryBudget {
    pub system_tokens: usize,
    pub user_tokens: usize,
    pub token_limit: usize,
    /// Tokens available for history.
    pub remaining: usize,
}

/// Compute the history budget for one request.
pub fn allocate(
    system_tokens: usize,
    user_tokens: usize,
    token_limit: usize,
) -> Result<HistoryBudget, ContextError> {
    // Signed so an oversize system prompt reports a negative remainder
    // instead of wrapping.
    let remaining = token_limit as i64 - (system_tokens as i64 + user_tokens as i64);

    if remaining < MIN_HISTORY_TOKENS as i64 {
        return Err(ContextError::BudgetExceeded {
            system_tokens,
            user_tokens,
            token_limit,
            remaining,
            minimum: MIN_HISTORY_TOKENS,
        });
    }

    Ok(HistoryBudget {
        system_tokens,
        user_tokens,
        token_limit,
        remaining: remaining as usize,
    })
}
