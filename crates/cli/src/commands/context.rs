//! `parley context`: print the assembled context as JSON.
//!
//! Nothing is sent to the provider and nothing is persisted.

use parley_core::ChatId;

use crate::runtime::{self, CliResult};

pub async fn run(chat_id: ChatId, text: &str) -> CliResult {
    let config = runtime::load_config()?;
    let engine = runtime::engine(&config).await?;

    let assembled = engine.preview_context(chat_id, text).await?;
    let output = serde_json::json!({
        "model": engine.settings().model,
        "system": assembled.context.system,
        "messages": assembled.context.messages,
        "metadata": assembled.metadata,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
