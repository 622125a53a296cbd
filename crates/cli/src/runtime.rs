//! Wiring shared by the commands: config → store → provider → engine.

use std::sync::Arc;

use parley_config::AppConfig;
use parley_core::ChatStore;
use parley_engine::{ChatEngine, GenerationSettings, PromptVariant};
use parley_store::{InMemoryStore, SqliteStore};
use tracing::debug;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn load_config() -> CliResult<AppConfig> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

pub async fn open_store(config: &AppConfig) -> CliResult<Arc<dyn ChatStore>> {
    match config.storage.backend.as_str() {
        "in_memory" => Ok(Arc::new(InMemoryStore::new())),
        _ => {
            let path = config.storage_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let url = format!("sqlite://{}", path.display());
            debug!(path = %path.display(), "Opening chat database");
            Ok(Arc::new(SqliteStore::new(&url).await?))
        }
    }
}

pub fn settings(config: &AppConfig) -> CliResult<GenerationSettings> {
    let variant: PromptVariant = config.prompt.variant.parse()?;
    Ok(GenerationSettings {
        model: config.default_model.clone(),
        token_limit: config.token_limit_for(&config.default_model),
        temperature: config.default_temperature,
        max_tokens: Some(config.default_max_tokens),
        variant,
        jailbreak: config.prompt.jailbreak.clone(),
    })
}

/// Everything needed to run engine operations.
pub async fn engine(config: &AppConfig) -> CliResult<ChatEngine> {
    let store = open_store(config).await?;
    let router = parley_providers::build_from_config(config);
    let provider = router.default_provider()?;

    Ok(ChatEngine::new(store, provider, settings(config)?).with_persona(config.persona.to_persona()))
}

/// Fail early with setup instructions when no key is configured.
pub fn require_api_key(config: &AppConfig) -> CliResult {
    if config.has_api_key() {
        return Ok(());
    }
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    PARLEY_API_KEY       (generic)");
    eprintln!("    OPENROUTER_API_KEY   (recommended)");
    eprintln!("    OPENAI_API_KEY");
    eprintln!("    ANTHROPIC_API_KEY");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_path().display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}
