//! Chat, Message and Candidate domain types.
//!
//! These are the value objects that flow through the engine:
//! storage hands out `Message`s → the context engine turns them into
//! `ProviderMessage`s → the provider reply is written back as a new
//! `Message` or `Candidate`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::card::CardData;
use crate::error::Error;

macro_rules! storage_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

storage_id!(
    /// Identifier of a chat, assigned by storage.
    ChatId
);
storage_id!(
    /// Identifier of a message. Assigned by storage, monotonically increasing,
    /// so id order is chronological order within a chat.
    MessageId
);
storage_id!(
    /// Identifier of a candidate reply.
    CandidateId
);

/// Who authored a persisted turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Character,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Character => "character",
        }
    }

    /// The provider role this sender maps to.
    pub fn role(&self) -> Role {
        match self {
            Self::User => Role::User,
            Self::Character => Role::Assistant,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sender string that is neither `user` nor `character`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sender '{0}'")]
pub struct ParseSenderError(pub String);

impl std::str::FromStr for Sender {
    type Err = ParseSenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "character" => Ok(Self::Character),
            other => Err(ParseSenderError(other.to_string())),
        }
    }
}

/// A conversation with one character card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    /// The card this chat is played with.
    pub card: CardData,
    pub created_at: DateTime<Utc>,
}

/// An alternative reply text attached to a `character` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub message_id: MessageId,
    pub text: String,
}

/// One persisted conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender: Sender,

    /// The message's own text. Canonical only while no prime candidate is set.
    pub text: String,

    pub inserted_at: DateTime<Utc>,

    /// Which candidate, if any, is canonical for this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prime_candidate_id: Option<CandidateId>,

    /// Candidates in insertion order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
}

impl Message {
    /// The text that currently represents this turn: the prime candidate's
    /// text if one is set, otherwise the message's own text.
    pub fn canonical_text(&self) -> &str {
        self.prime_candidate()
            .map(|c| c.text.as_str())
            .unwrap_or(&self.text)
    }

    pub fn prime_candidate(&self) -> Option<&Candidate> {
        let prime = self.prime_candidate_id?;
        self.candidates.iter().find(|c| c.id == prime)
    }

    pub fn owns_candidate(&self, candidate_id: CandidateId) -> bool {
        self.candidates.iter().any(|c| c.id == candidate_id)
    }
}

/// Provider-facing role. Closed: there is no system or tool role in a
/// roleplay payload, the system prompt travels separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One entry of an assembled context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
}

impl ProviderMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for ProviderMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.sender.role(),
            content: message.canonical_text().to_string(),
        }
    }
}

/// The ephemeral payload for one provider call. Never persisted or cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub system: String,
    pub messages: Vec<ProviderMessage>,
}

/// What an edit applies to: exactly one message or exactly one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EditTarget {
    Message(MessageId),
    Candidate(CandidateId),
}

impl EditTarget {
    /// Build a target from loosely-typed input, rejecting both/neither.
    pub fn from_parts(
        message: Option<MessageId>,
        candidate: Option<CandidateId>,
    ) -> Result<Self, Error> {
        match (message, candidate) {
            (Some(m), None) => Ok(Self::Message(m)),
            (None, Some(c)) => Ok(Self::Candidate(c)),
            (Some(_), Some(_)) => Err(Error::InvalidReference(
                "edit target must be a message or a candidate, not both".into(),
            )),
            (None, None) => Err(Error::InvalidReference(
                "edit target requires a message or a candidate".into(),
            )),
        }
    }
}
