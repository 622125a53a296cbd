//! `parley new` and `parley chats`: chat creation and listing.

use std::path::Path;

use parley_core::CardData;

use crate::runtime::{self, CliResult};

/// Read a card file. Accepts either the bare card or `{ "data": card }`.
pub fn read_card(path: &Path) -> CliResult<CardData> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read card {}: {e}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid card JSON in {}: {e}", path.display()))?;
    let card = match value.get("data") {
        Some(data) if data.get("character").is_some() => data.clone(),
        _ => value,
    };
    Ok(serde_json::from_value(card)?)
}

pub async fn create(card_path: &Path) -> CliResult {
    let config = runtime::load_config()?;
    let card = read_card(card_path)?;
    let store = runtime::open_store(&config).await?;

    let chat_id = store.create_chat(&card).await?;
    println!("✅ Created chat {chat_id} with {}", card.character.name);
    if !card.character.greeting.trim().is_empty() {
        println!();
        println!("  {}: {}", card.character.name, card.character.greeting.trim());
    }
    println!();
    println!("   Run: parley chat {chat_id}");
    Ok(())
}

pub async fn list() -> CliResult {
    let config = runtime::load_config()?;
    let store = runtime::open_store(&config).await?;
    let chats = store.list_chats().await?;

    if chats.is_empty() {
        println!("No chats yet. Create one with: parley new --card <card.json>");
        return Ok(());
    }

    println!("  {:>5}  {:<24}  {}", "ID", "CHARACTER", "CREATED");
    for chat in chats {
        println!(
            "  {:>5}  {:<24}  {}",
            chat.id,
            chat.card.character.name,
            chat.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
