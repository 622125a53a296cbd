//! Token estimation.
//!
//! Uses a character-based heuristic with a per-family chars-per-token ratio.
//! Counts characters, not bytes, so CJK and emoji text is not overcounted.
//! The engine only promises budget conformance under whichever `Tokenizer`
//! it is given; plug in an exact counter if one is available.

use parley_core::Tokenizer;

/// Ratio used when nothing better is known about the model.
const CONSERVATIVE_CHARS_PER_TOKEN: f32 = 3.5;

/// Heuristic tokenizer: `ceil(chars / chars_per_token)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicTokenizer {
    chars_per_token: f32,
}

impl HeuristicTokenizer {
    pub fn new(chars_per_token: f32) -> Self {
        Self {
            chars_per_token: chars_per_token.max(0.1),
        }
    }

    /// Pick a ratio from the model name.
    pub fn for_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        let family = model.rsplit('/').next().unwrap_or(&model);

        let ratio = if family.starts_with("gpt-4o")
            || family.starts_with("o1")
            || family.starts_with("o3")
            || family.starts_with("o4")
        {
            3.9
        } else if family.starts_with("gpt-") || family.starts_with("claude") {
            3.7
        } else if family.starts_with("gemini") {
            3.5
        } else if ["llama", "mistral", "mixtral", "qwen", "gemma"]
            .iter()
            .any(|p| family.starts_with(p))
        {
            3.3
        } else {
            CONSERVATIVE_CHARS_PER_TOKEN
        };
        Self::new(ratio)
    }

    pub fn chars_per_token(&self) -> f32 {
        self.chars_per_token
    }
}

impl Default for HeuristicTokenizer {
    /// 1 token ≈ 4 characters.
    fn default() -> Self {
        Self::new(4.0)
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count();
        (chars as f32 / self.chars_per_token).ceil() as usize
    }
}

/// The tokenizer used for a model identifier.
pub fn tokenizer_for_model(model: &str) -> HeuristicTokenizer {
    HeuristicTokenizer::for_model(model)
}
