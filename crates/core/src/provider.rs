//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider takes an assembled context (system prompt plus alternating
//! user/assistant messages) and returns the character's reply text.
//!
//! Implementations: OpenAI-compatible, Anthropic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Context, ProviderMessage};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "anthropic/claude-sonnet-4", "gpt-4o")
    pub model: String,

    /// Rendered system prompt
    pub system: String,

    /// Strictly alternating messages, starting with `user`
    pub messages: Vec<ProviderMessage>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// Build a request from an assembled context.
    pub fn from_context(model: impl Into<String>, context: Context) -> Self {
        Self {
            model: model.into(),
            system: context.system,
            messages: context.messages,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// The core Provider trait.
///
/// No cancellation contract: a timeout or abort surfaces as a
/// `ProviderError` like any other failure.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter", "anthropic").
    fn name(&self) -> &str;

    /// Generate the reply for a new turn.
    async fn generate(&self, request: ProviderRequest) -> Result<String, ProviderError>;

    /// Generate an alternative reply for an existing turn.
    ///
    /// Default implementation calls `generate()`.
    async fn regenerate(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        self.generate(request).await
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
