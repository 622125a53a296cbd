//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use parley_core::{MIN_HISTORY_TOKENS, PersonaData};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prompt variants the renderer knows by name.
pub const PROMPT_VARIANTS: &[&str] = &["markdown", "xml"];

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Context window used when a model has no entry in `model_token_limits`
    #[serde(default = "default_token_limit")]
    pub default_token_limit: usize,

    /// Per-model context window overrides (model name → tokens)
    #[serde(default)]
    pub model_token_limits: HashMap<String, usize>,

    /// Chat storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// System prompt rendering
    #[serde(default)]
    pub prompt: PromptConfig,

    /// The user's persona
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_token_limit() -> usize {
    8192
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("default_token_limit", &self.default_token_limit)
            .field("model_token_limits", &self.model_token_limits)
            .field("storage", &self.storage)
            .field("prompt", &self.prompt)
            .field("persona", &self.persona)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite" or "in_memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Database file; relative paths resolve against the config directory
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_backend() -> String {
    "sqlite".into()
}
fn default_storage_path() -> String {
    "chats.sqlite".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Template variant: "markdown" or "xml"
    #[serde(default = "default_variant")]
    pub variant: String,

    /// Free-form instructions appended to every system prompt
    #[serde(default)]
    pub jailbreak: String,
}

fn default_variant() -> String {
    "markdown".into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            jailbreak: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_persona_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,
}

fn default_persona_name() -> String {
    "User".into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            description: String::new(),
        }
    }
}

impl PersonaConfig {
    pub fn to_persona(&self) -> PersonaData {
        PersonaData {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `PARLEY_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    /// - `ANTHROPIC_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("PARLEY_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("PARLEY_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("PARLEY_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Resolve the chat database path.
    pub fn storage_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.storage.path);
        if path.is_absolute() {
            path
        } else {
            Self::config_dir().join(path)
        }
    }

    /// The context window for a model, falling back to `default_token_limit`.
    pub fn token_limit_for(&self, model: &str) -> usize {
        self.model_token_limits
            .get(model)
            .copied()
            .unwrap_or(self.default_token_limit)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.default_token_limit <= MIN_HISTORY_TOKENS {
            return Err(ConfigError::ValidationError(format!(
                "default_token_limit must be greater than {MIN_HISTORY_TOKENS}"
            )));
        }

        if let Some((model, limit)) = self
            .model_token_limits
            .iter()
            .find(|(_, limit)| **limit <= MIN_HISTORY_TOKENS)
        {
            return Err(ConfigError::ValidationError(format!(
                "token limit for '{model}' ({limit}) must be greater than {MIN_HISTORY_TOKENS}"
            )));
        }

        if !PROMPT_VARIANTS.contains(&self.prompt.variant.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "prompt.variant must be one of {PROMPT_VARIANTS:?}, got '{}'",
                self.prompt.variant
            )));
        }

        if !matches!(self.storage.backend.as_str(), "sqlite" | "in_memory") {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be 'sqlite' or 'in_memory', got '{}'",
                self.storage.backend
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            default_token_limit: default_token_limit(),
            model_token_limits: HashMap::new(),
            storage: StorageConfig::default(),
            prompt: PromptConfig::default(),
            persona: PersonaConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for parley_core::Error {
    fn from(err: ConfigError) -> Self {
        parley_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.prompt.variant, "markdown");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.default_token_limit, config.default_token_limit);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn token_limit_at_floor_rejected() {
        let config = AppConfig {
            default_token_limit: 300,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.model_token_limits.insert("tiny".into(), 120);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tiny"));
    }

    #[test]
    fn unknown_variant_rejected() {
        let mut config = AppConfig::default();
        config.prompt.variant = "yaml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn token_limit_resolves_per_model() {
        let mut config = AppConfig::default();
        config.model_token_limits.insert("gpt-4o".into(), 128_000);
        assert_eq!(config.token_limit_for("gpt-4o"), 128_000);
        assert_eq!(config.token_limit_for("unknown"), 8192);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_provider, "openrouter");
    }

    #[test]
    fn loads_file_with_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "gpt-4o"
default_token_limit = 4096

[model_token_limits]
"gpt-4o" = 16000

[prompt]
jailbreak = "Stay in character."

[persona]
name = "Mika"
description = "A traveling bard."

[providers.openai]
api_url = "https://api.openai.com/v1"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.token_limit_for("gpt-4o"), 16000);
        assert_eq!(config.prompt.jailbreak, "Stay in character.");
        assert_eq!(config.persona.to_persona().name, "Mika");
        assert!(config.providers.contains_key("openai"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_token_limit = \"lots\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("markdown"));
    }
}
