//! Message commands: history, regenerate, prime, edit, rewind, delete.

use parley_core::{CandidateId, ChatId, EditTarget, Message, MessageId, Sender};
use parley_engine::Outcome;

use crate::runtime::{self, CliResult};

pub async fn history(chat_id: ChatId) -> CliResult {
    let config = runtime::load_config()?;
    let engine = runtime::engine(&config).await?;
    let chat = engine
        .store()
        .get_chat(chat_id)
        .await?
        .ok_or_else(|| format!("Chat {chat_id} does not exist"))?;

    let messages = engine.history(chat_id).await?;
    if messages.is_empty() {
        println!("  (empty chat)");
    }
    for message in &messages {
        print!("{}", render_message(message, &chat.card.character.name, &config.persona.name));
    }
    Ok(())
}

/// One message block: header line, canonical text, then any candidates with
/// the prime one marked.
fn render_message(message: &Message, character: &str, persona: &str) -> String {
    let speaker = match message.sender {
        Sender::User => persona,
        Sender::Character => character,
    };
    let mut out = format!("[{}] {speaker}\n", message.id);
    for line in message.canonical_text().lines() {
        out.push_str(&format!("    {line}\n"));
    }
    if !message.candidates.is_empty() {
        let base = if message.prime_candidate_id.is_none() { "*" } else { " " };
        out.push_str(&format!("    {base} original: {}\n", first_line(&message.text)));
        for candidate in &message.candidates {
            let mark = if Some(candidate.id) == message.prime_candidate_id {
                "*"
            } else {
                " "
            };
            out.push_str(&format!(
                "    {mark} candidate {}: {}\n",
                candidate.id,
                first_line(&candidate.text)
            ));
        }
    }
    out.push('\n');
    out
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

pub async fn regenerate(message_id: MessageId) -> CliResult {
    let config = runtime::load_config()?;
    runtime::require_api_key(&config)?;
    let engine = runtime::engine(&config).await?;

    match engine.regenerate(message_id).await? {
        Outcome::Done(regen) => {
            println!("✅ Candidate {} is now prime for message {}", regen.candidate_id, message_id);
            println!();
            println!("{}", regen.text);
        }
        Outcome::Busy => eprintln!("  A reply is already being generated for this chat."),
    }
    Ok(())
}

pub async fn prime(message_id: MessageId, candidate: Option<CandidateId>) -> CliResult {
    let config = runtime::load_config()?;
    let engine = runtime::engine(&config).await?;

    match candidate {
        Some(candidate_id) => {
            engine.set_prime(message_id, candidate_id).await?;
            println!("✅ Candidate {candidate_id} is now prime for message {message_id}");
        }
        None => {
            engine.clear_prime(message_id).await?;
            println!("✅ Message {message_id} shows its original text");
        }
    }
    Ok(())
}

pub async fn edit(
    message: Option<MessageId>,
    candidate: Option<CandidateId>,
    text: &str,
) -> CliResult {
    let target = EditTarget::from_parts(message, candidate)?;
    let config = runtime::load_config()?;
    let engine = runtime::engine(&config).await?;

    engine.edit(target, text).await?;
    match target {
        EditTarget::Message(id) => println!("✅ Message {id} updated"),
        EditTarget::Candidate(id) => println!("✅ Candidate {id} updated"),
    }
    Ok(())
}

pub async fn rewind(chat_id: ChatId, message_id: MessageId) -> CliResult {
    let config = runtime::load_config()?;
    let engine = runtime::engine(&config).await?;

    let removed = engine.rewind(chat_id, message_id).await?;
    println!("✅ Removed {removed} message(s) after {message_id}");
    Ok(())
}

pub async fn delete(message_id: MessageId) -> CliResult {
    let config = runtime::load_config()?;
    let engine = runtime::engine(&config).await?;

    engine.delete(message_id).await?;
    println!("✅ Message {message_id} deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_core::Candidate;

    fn message() -> Message {
        Message {
            id: MessageId(5),
            chat_id: ChatId(1),
            sender: Sender::Character,
            text: "Rest here tonight.".into(),
            inserted_at: Utc::now(),
            prime_candidate_id: None,
            candidates: vec![],
        }
    }

    #[test]
    fn plain_message() {
        let out = render_message(&message(), "Saku", "Ren");
        assert_eq!(out, "[5] Saku\n    Rest here tonight.\n\n");
    }

    #[test]
    fn prime_candidate_is_marked() {
        let mut msg = message();
        msg.candidates = vec![Candidate {
            id: CandidateId(9),
            message_id: MessageId(5),
            text: "You look tired.".into(),
        }];
        msg.prime_candidate_id = Some(CandidateId(9));

        let out = render_message(&msg, "Saku", "Ren");
        assert!(out.contains("    You look tired.\n"));
        assert!(out.contains("      original: Rest here tonight."));
        assert!(out.contains("    * candidate 9: You look tired."));
    }

    #[test]
    fn user_messages_use_persona_name() {
        let mut msg = message();
        msg.sender = Sender::User;
        assert!(render_message(&msg, "Saku", "Ren").starts_with("[5] Ren\n"));
    }
}
