//! `parley chat`: Interactive or single-message chat mode.

use std::io::Write;

use parley_core::{ChatId, Error};
use parley_engine::{ChatEngine, Outcome};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::runtime::{self, CliResult};

pub async fn run(chat_id: ChatId, message: Option<String>) -> CliResult {
    let message = message.as_deref().map(message_text).transpose()?;
    let config = runtime::load_config()?;
    runtime::require_api_key(&config)?;
    let engine = runtime::engine(&config).await?;

    let chat = engine
        .store()
        .get_chat(chat_id)
        .await?
        .ok_or_else(|| format!("Chat {chat_id} does not exist"))?;
    let name = chat.card.character.name;

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let outcome = engine.send(chat_id, msg).await;
        eprint!("\r              \r");
        match outcome? {
            Outcome::Done(pair) => println!("{}", pair.reply),
            Outcome::Busy => eprintln!("  A reply is already being generated for this chat."),
        }
        return Ok(());
    }

    println!();
    println!("  Chat:      {chat_id} with {name}");
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Persona:   {}", config.persona.name);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  {} > ", config.persona.name);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        turn(&engine, chat_id, &name, line).await;
    }

    println!("\n  Goodbye.");
    Ok(())
}

async fn turn(engine: &ChatEngine, chat_id: ChatId, name: &str, text: &str) {
    eprint!("  ...");
    let result = engine.send_with_pending(chat_id, text).await;
    eprint!("\r     \r");

    match result {
        Ok(Outcome::Done(pair)) => println!("\n  {name}: {}\n", pair.reply),
        Ok(Outcome::Busy) => eprintln!("  A reply is already being generated for this chat."),
        Err(failure) => {
            match &failure.error {
                Error::Context(e) => eprintln!("  ❌ {e}"),
                other => eprintln!("  ❌ Error: {other}"),
            }
            eprintln!("  Your message was not sent: {}", failure.input);
        }
    }
}

/// The text to send for `-m`, refusing blank input like the interactive loop.
fn message_text(raw: &str) -> CliResult<&str> {
    let text = raw.trim();
    if text.is_empty() {
        return Err("Message is empty; nothing to send".into());
    }
    Ok(text)
}
