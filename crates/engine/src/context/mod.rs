//! Token-budgeted context assembly.
//!
//! | Stage | Module | Behaviour |
//! |-------|--------|-----------|
//! | Tokenizer | `token` | Char-ratio estimate per model family |
//! | Budget | `budget` | limit − system − latest, refuse below 300 |
//! | History | `history` | Pages of 100 newest-first, stop at first overflow |
//! | Normalize | `normalize` | Start with `user`, merge same-role runs |
//! | Template | `template` | Markdown system prompt, conditional sections |

pub mod assembler;
pub mod budget;
pub mod history;
pub mod memory;
pub mod normalize;
pub mod template;
pub mod token;

pub use assembler::{AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler};
pub use budget::{HistoryBudget, allocate};
pub use history::{HistoryWindow, PAGE_SIZE, WindowStop, fetch_window};
pub use memory::{CharacterMemory, NoCharacterMemory};
pub use normalize::{BEGIN_CONVERSATION, merge_consecutive, normalize};
pub use template::{PromptVariant, SystemPromptParams, render_system_prompt};
pub use token::{HeuristicTokenizer, tokenizer_for_model};
