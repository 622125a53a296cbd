//! The branching chat engine.
//!
//! Every message operation goes through here: send and regenerate assemble
//! a context and call the provider under the per-chat generation guard;
//! set-prime, edit, rewind and delete are single store calls validated up
//! front so a rejected request never has side effects.

use std::sync::Arc;

use parley_core::{
    CandidateId, CardData, ChatId, ChatStore, EditTarget, Error, Message, MessageId, PersonaData,
    Provider, ProviderRequest, Result, Sender, Tokenizer,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chat::guard::GenerationGuard;
use crate::chat::pending::PendingTurns;
use crate::context::{
    AssembledContext, AssemblyInput, BEGIN_CONVERSATION, CharacterMemory, ContextAssembler,
    PAGE_SIZE, PromptVariant, tokenizer_for_model,
};

/// Per-engine generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub model: String,
    pub token_limit: usize,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub variant: PromptVariant,
    #[serde(default)]
    pub jailbreak: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "anthropic/claude-sonnet-4".into(),
            token_limit: 8192,
            temperature: 0.7,
            max_tokens: Some(1024),
            variant: PromptVariant::Markdown,
            jailbreak: String::new(),
        }
    }
}

/// Result of a guarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    /// A generation is already running for this chat; nothing was done.
    Busy,
}

impl<T> Outcome<T> {
    pub fn into_done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Busy => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// A persisted user/character pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentPair {
    pub user_id: MessageId,
    pub character_id: MessageId,
    pub reply: String,
}

/// A new candidate, already prime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Regenerated {
    pub message_id: MessageId,
    pub candidate_id: CandidateId,
    pub text: String,
}

/// A failed send, carrying the caller's input back.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct SendFailure {
    pub input: String,
    #[source]
    pub error: Error,
}

pub struct ChatEngine {
    store: Arc<dyn ChatStore>,
    provider: Arc<dyn Provider>,
    assembler: ContextAssembler,
    settings: GenerationSettings,
    persona: PersonaData,
    guard: GenerationGuard,
    pending: PendingTurns,
}

impl ChatEngine {
    pub fn new(
        store: Arc<dyn ChatStore>,
        provider: Arc<dyn Provider>,
        settings: GenerationSettings,
    ) -> Self {
        let tokenizer = Arc::new(tokenizer_for_model(&settings.model));
        Self {
            store,
            provider,
            assembler: ContextAssembler::new(tokenizer),
            settings,
            persona: PersonaData {
                name: "User".into(),
                description: String::new(),
            },
            guard: GenerationGuard::new(),
            pending: PendingTurns::new(),
        }
    }

    pub fn with_persona(mut self, persona: PersonaData) -> Self {
        self.persona = persona;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.assembler = self.assembler.with_tokenizer(tokenizer);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn CharacterMemory>) -> Self {
        self.assembler = self.assembler.with_memory(memory);
        self
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn pending(&self) -> &PendingTurns {
        &self.pending
    }

    pub fn is_generating(&self, chat_id: ChatId) -> bool {
        self.guard.is_generating(chat_id)
    }

    /// Send a user message and persist it together with the reply.
    ///
    /// Nothing is written unless the provider answers.
    pub async fn send(&self, chat_id: ChatId, text: &str) -> Result<Outcome<SentPair>> {
        let Some(_permit) = self.guard.try_acquire(chat_id) else {
            debug!(chat = %chat_id, "Generation in flight, send ignored");
            return Ok(Outcome::Busy);
        };
        self.send_locked(chat_id, text).await.map(Outcome::Done)
    }

    /// `send` with an optimistic pending entry: visible in `pending()` while
    /// the provider runs, committed on success, retracted on failure with
    /// the input handed back.
    pub async fn send_with_pending(
        &self,
        chat_id: ChatId,
        text: &str,
    ) -> std::result::Result<Outcome<SentPair>, SendFailure> {
        let Some(_permit) = self.guard.try_acquire(chat_id) else {
            return Ok(Outcome::Busy);
        };

        let pending_id = self.pending.apply(chat_id, text);
        match self.send_locked(chat_id, text).await {
            Ok(pair) => {
                self.pending.commit(chat_id, pending_id);
                Ok(Outcome::Done(pair))
            }
            Err(error) => {
                let input = self
                    .pending
                    .retract(chat_id, pending_id)
                    .unwrap_or_else(|| text.to_string());
                warn!(chat = %chat_id, error = %error, "Send failed, pending turn retracted");
                Err(SendFailure { input, error })
            }
        }
    }

    async fn send_locked(&self, chat_id: ChatId, text: &str) -> Result<SentPair> {
        let card = self.chat_card(chat_id).await?;
        let assembled = self.assemble(chat_id, &card, text, None).await?;

        let request = self.request(assembled);
        let reply = self.provider.generate(request).await?;

        let ids = self.store.insert_pair(chat_id, text, &reply).await?;
        info!(
            chat = %chat_id,
            user_id = %ids.user_id,
            character_id = %ids.character_id,
            "Turn persisted"
        );
        Ok(SentPair {
            user_id: ids.user_id,
            character_id: ids.character_id,
            reply,
        })
    }

    /// Ask for a new reply to a character message's turn and make it prime.
    pub async fn regenerate(&self, message_id: MessageId) -> Result<Outcome<Regenerated>> {
        let message = self.message(message_id).await?;
        if message.sender != Sender::Character {
            return Err(Error::InvalidReference(format!(
                "message {message_id} is not a character message"
            )));
        }
        let chat_id = message.chat_id;

        let Some(_permit) = self.guard.try_acquire(chat_id) else {
            debug!(chat = %chat_id, "Generation in flight, regenerate ignored");
            return Ok(Outcome::Busy);
        };

        let card = self.chat_card(chat_id).await?;
        let previous = self
            .store
            .fetch_before(chat_id, 1, Some(message_id))
            .await?
            .into_iter()
            .next();

        // The reply answers the nearest user turn; a greeting answers the
        // opening instruction.
        let (latest, before) = match previous {
            Some(prev) if prev.sender == Sender::User => {
                (prev.canonical_text().to_string(), Some(prev.id))
            }
            _ => (BEGIN_CONVERSATION.to_string(), Some(message_id)),
        };

        let assembled = self.assemble(chat_id, &card, &latest, before).await?;
        let request = self.request(assembled);
        let text = self.provider.regenerate(request).await?;

        let candidate_id = self.store.insert_candidate(message_id, &text).await?;
        info!(chat = %chat_id, message = %message_id, candidate = %candidate_id, "Candidate added");
        Ok(Outcome::Done(Regenerated {
            message_id,
            candidate_id,
            text,
        }))
    }

    /// Make one of the message's candidates canonical.
    pub async fn set_prime(&self, message_id: MessageId, candidate_id: CandidateId) -> Result<()> {
        if !self.store.set_prime(message_id, Some(candidate_id)).await? {
            return Err(Error::InvalidReference(format!(
                "candidate {candidate_id} does not belong to message {message_id}"
            )));
        }
        debug!(message = %message_id, candidate = %candidate_id, "Prime candidate set");
        Ok(())
    }

    /// Fall back to the message's own text.
    pub async fn clear_prime(&self, message_id: MessageId) -> Result<()> {
        if !self.store.set_prime(message_id, None).await? {
            return Err(Error::InvalidReference(format!(
                "message {message_id} does not exist"
            )));
        }
        Ok(())
    }

    /// Replace a message's or candidate's text in place.
    pub async fn edit(&self, target: EditTarget, text: &str) -> Result<()> {
        if !self.store.update_text(target, text).await? {
            return Err(Error::InvalidReference(match target {
                EditTarget::Message(id) => format!("message {id} does not exist"),
                EditTarget::Candidate(id) => format!("candidate {id} does not exist"),
            }));
        }
        Ok(())
    }

    /// Delete everything in the chat after `message_id`. The cut point stays.
    pub async fn rewind(&self, chat_id: ChatId, message_id: MessageId) -> Result<u64> {
        let message = self.message(message_id).await?;
        if message.chat_id != chat_id {
            return Err(Error::InvalidReference(format!(
                "message {message_id} is not part of chat {chat_id}"
            )));
        }
        let removed = self.store.delete_after(chat_id, message_id).await?;
        info!(chat = %chat_id, cut = %message_id, removed, "Chat rewound");
        Ok(removed)
    }

    /// Delete one message and its candidates.
    pub async fn delete(&self, message_id: MessageId) -> Result<()> {
        if !self.store.delete_message(message_id).await? {
            return Err(Error::InvalidReference(format!(
                "message {message_id} does not exist"
            )));
        }
        Ok(())
    }

    /// The whole chat in chronological order.
    pub async fn history(&self, chat_id: ChatId) -> Result<Vec<Message>> {
        if !self.store.chat_exists(chat_id).await? {
            return Err(Error::InvalidReference(format!("chat {chat_id} does not exist")));
        }
        let mut messages = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.store.fetch_before(chat_id, PAGE_SIZE, cursor).await?;
            let Some(oldest) = page.last() else { break };
            cursor = Some(oldest.id);
            messages.extend(page);
        }
        messages.reverse();
        Ok(messages)
    }

    /// The context a send of `text` would use, without calling the provider.
    pub async fn preview_context(&self, chat_id: ChatId, text: &str) -> Result<AssembledContext> {
        let card = self.chat_card(chat_id).await?;
        self.assemble(chat_id, &card, text, None).await
    }

    async fn assemble(
        &self,
        chat_id: ChatId,
        card: &CardData,
        latest: &str,
        before: Option<MessageId>,
    ) -> Result<AssembledContext> {
        self.assembler
            .assemble(
                self.store.as_ref(),
                AssemblyInput {
                    chat_id,
                    latest_user_message: latest,
                    card,
                    persona: &self.persona,
                    jailbreak: &self.settings.jailbreak,
                    variant: self.settings.variant,
                    token_limit: self.settings.token_limit,
                    before,
                },
            )
            .await
    }

    fn request(&self, assembled: AssembledContext) -> ProviderRequest {
        let request = ProviderRequest::from_context(&self.settings.model, assembled.context)
            .with_temperature(self.settings.temperature);
        match self.settings.max_tokens {
            Some(max) => request.with_max_tokens(max),
            None => request,
        }
    }

    async fn chat_card(&self, chat_id: ChatId) -> Result<CardData> {
        self.store
            .get_chat(chat_id)
            .await?
            .map(|chat| chat.card)
            .ok_or_else(|| Error::InvalidReference(format!("chat {chat_id} does not exist")))
    }

    async fn message(&self, message_id: MessageId) -> Result<Message> {
        self.store
            .get_message(message_id)
            .await?
            .ok_or_else(|| Error::InvalidReference(format!("message {message_id} does not exist")))
    }
}
