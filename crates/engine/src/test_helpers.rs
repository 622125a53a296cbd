//! Shared test helpers for engine tests.

use parley_core::error::ProviderError;
use parley_core::provider::{Provider, ProviderRequest};
use parley_core::tokenizer::Tokenizer;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

/// One token per whitespace-separated word. Easy to reason about in tests.
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// A provider that returns a sequence of scripted replies and records every
/// request it receives.
///
/// Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: no more replies")
    }
}

/// A provider that blocks until released, for overlapping generations.
pub struct GatedProvider {
    pub entered: Notify,
    pub release: Notify,
    reply: String,
}

impl GatedProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            entered: Notify::new(),
            release: Notify::new(),
            reply: reply.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Provider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn generate(&self, _request: ProviderRequest) -> Result<String, ProviderError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.reply.clone())
    }
}
