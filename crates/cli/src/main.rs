//! Parley CLI: the main entry point.
//!
//! Commands:
//! - `init`: Write the default config
//! - `new`: Start a chat from a character card
//! - `chats`: List chats
//! - `chat`: Interactive or single-message chat
//! - `history`: Print a chat with candidates
//! - `regenerate`: New candidate for a character message
//! - `prime`: Choose or clear the prime candidate
//! - `edit`: Rewrite a message or candidate in place
//! - `rewind`: Cut a chat after a message
//! - `delete`: Remove one message
//! - `context`: Show the assembled context without calling the model

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley — roleplay chat with token-budgeted context",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init,

    /// Create a chat from a character card (JSON)
    New {
        #[arg(long)]
        card: PathBuf,
    },

    /// List chats, newest first
    Chats,

    /// Chat with a character
    Chat {
        chat_id: i64,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print a chat's messages and candidates
    History { chat_id: i64 },

    /// Generate a new candidate reply for a character message
    Regenerate { message_id: i64 },

    /// Set or clear the prime candidate of a message
    Prime {
        message_id: i64,

        #[arg(long, conflicts_with = "clear", required_unless_present = "clear")]
        candidate: Option<i64>,

        #[arg(long)]
        clear: bool,
    },

    /// Replace the text of a message or a candidate
    Edit {
        #[arg(long)]
        message: Option<i64>,

        #[arg(long)]
        candidate: Option<i64>,

        text: String,
    },

    /// Delete every message after the given one
    Rewind { chat_id: i64, message_id: i64 },

    /// Delete a single message
    Delete { message_id: i64 },

    /// Print the context a message would be sent with, as JSON
    Context { chat_id: i64, text: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter(cli.verbose))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::New { card } => commands::chats::create(&card).await?,
        Commands::Chats => commands::chats::list().await?,
        Commands::Chat { chat_id, message } => commands::chat::run(chat_id.into(), message).await?,
        Commands::History { chat_id } => commands::messages::history(chat_id.into()).await?,
        Commands::Regenerate { message_id } => {
            commands::messages::regenerate(message_id.into()).await?
        }
        Commands::Prime {
            message_id,
            candidate,
            clear,
        } => {
            let candidate = if clear { None } else { candidate.map(Into::into) };
            commands::messages::prime(message_id.into(), candidate).await?
        }
        Commands::Edit {
            message,
            candidate,
            text,
        } => {
            commands::messages::edit(message.map(Into::into), candidate.map(Into::into), &text)
                .await?
        }
        Commands::Rewind {
            chat_id,
            message_id,
        } => commands::messages::rewind(chat_id.into(), message_id.into()).await?,
        Commands::Delete { message_id } => commands::messages::delete(message_id.into()).await?,
        Commands::Context { chat_id, text } => commands::context::run(chat_id.into(), &text).await?,
    }

    Ok(())
}

/// Default log filter when `RUST_LOG` is not set.
fn log_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn prime_requires_candidate_or_clear() {
        assert!(Cli::try_parse_from(["parley", "prime", "4"]).is_err());
        assert!(Cli::try_parse_from(["parley", "prime", "4", "--clear"]).is_ok());
        assert!(Cli::try_parse_from(["parley", "prime", "4", "--candidate", "2"]).is_ok());
        assert!(
            Cli::try_parse_from(["parley", "prime", "4", "--candidate", "2", "--clear"]).is_err()
        );
    }

    #[test]
    fn default_log_filter() {
        assert_eq!(log_filter(false), "info");
        assert_eq!(log_filter(true), "debug");
    }

    #[test]
    fn chat_accepts_single_message() {
        let cli = Cli::try_parse_from(["parley", "chat", "3", "-m", "Hello"]).unwrap();
        match cli.command {
            Commands::Chat { chat_id, message } => {
                assert_eq!(chat_id, 3);
                assert_eq!(message.as_deref(), Some("Hello"));
            }
            _ => panic!("expected chat command"),
        }
    }
}
