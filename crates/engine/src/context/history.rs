//! Sliding-window history fetcher.
//!
//! Walks a chat backwards in pages of `PAGE_SIZE`, keeping the most recent
//! messages whose canonical text fits in the history budget. The first
//! message that does not fit ends the walk, so the window is always a
//! contiguous run of the newest messages.

use parley_core::{ChatId, ChatStore, Message, MessageId, StorageError, Tokenizer};
use serde::Serialize;
use tracing::trace;

/// Messages requested from storage per page.
pub const PAGE_SIZE: usize = 100;

/// Why the walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStop {
    /// Storage returned an empty page: the whole chat fit.
    Exhausted,
    /// The accepted messages used the budget up exactly.
    BudgetFilled,
    /// The next older message would not have fit.
    Overflow,
}

/// The fetched window, in chronological order.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    pub messages: Vec<Message>,
    pub tokens: usize,
    pub pages: usize,
    pub stop: WindowStop,
}

/// Fetch the newest messages of `chat_id` that fit in `remaining` tokens.
///
/// `before` bounds the walk: only messages with a smaller id are considered.
pub async fn fetch_window(
    store: &dyn ChatStore,
    tokenizer: &dyn Tokenizer,
    chat_id: ChatId,
    remaining: usize,
    before: Option<MessageId>,
) -> Result<HistoryWindow, StorageError> {
    let mut accepted: Vec<Message> = Vec::new();
    let mut used = 0usize;
    let mut cursor = before;
    let mut pages = 0usize;

    let stop = 'walk: loop {
        if used == remaining {
            break WindowStop::BudgetFilled;
        }

        let page = store.fetch_before(chat_id, PAGE_SIZE, cursor).await?;
        pages += 1;
        if page.is_empty() {
            break WindowStop::Exhausted;
        }
        trace!(chat = %chat_id, page = pages, rows = page.len(), "History page");

        for message in page {
            let tokens = tokenizer.count_tokens(message.canonical_text());
            if used + tokens > remaining {
                break 'walk WindowStop::Overflow;
            }
            used += tokens;
            cursor = Some(message.id);
            accepted.push(message);
        }
    };

    accepted.reverse();
    Ok(HistoryWindow {
        messages: accepted,
        tokens: used,
        pages,
        stop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::WordTokenizer;
    use parley_core::CardData;
    use parley_store::InMemoryStore;

    fn words(n: usize) -> String {
        vec!["w"; n].join(" ")
    }

    async fn chat_with(store: &InMemoryStore, sizes: &[usize]) -> ChatId {
        let chat = store.create_chat(&CardData::named("Saku")).await.unwrap();
        for pair in sizes.chunks(2) {
            let user = words(pair[0]);
            let reply = words(*pair.get(1).unwrap_or(&1));
            store.insert_pair(chat, &user, &reply).await.unwrap();
        }
        chat
    }

    #[tokio::test]
    async fn keeps_newest_that_fit() {
        let store = InMemoryStore::new();
        let chat = chat_with(&store, &[200, 200, 200, 200, 200, 200]).await;
        // drop the oldest pair so exactly five 200-token messages remain
        let all = store.fetch_before(chat, 10, None).await.unwrap();
        store.delete_message(all.last().unwrap().id).await.unwrap();

        let window = fetch_window(&store, &WordTokenizer, chat, 930, None)
            .await
            .unwrap();
        assert_eq!(window.messages.len(), 4);
        assert_eq!(window.tokens, 800);
        assert_eq!(window.stop, WindowStop::Overflow);

        let ids: Vec<MessageId> = window.messages.iter().map(|m| m.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted, "window must be chronological");
        assert_eq!(*ids.last().unwrap(), all[0].id);
    }

    #[tokio::test]
    async fn whole_chat_fits() {
        let store = InMemoryStore::new();
        let chat = chat_with(&store, &[3, 4, 5, 6]).await;
        let window = fetch_window(&store, &WordTokenizer, chat, 1000, None)
            .await
            .unwrap();
        assert_eq!(window.messages.len(), 4);
        assert_eq!(window.tokens, 18);
        assert_eq!(window.stop, WindowStop::Exhausted);
    }

    #[tokio::test]
    async fn newest_message_too_large_yields_empty_window() {
        let store = InMemoryStore::new();
        let chat = chat_with(&store, &[10, 500]).await;
        let window = fetch_window(&store, &WordTokenizer, chat, 400, None)
            .await
            .unwrap();
        assert!(window.messages.is_empty());
        assert_eq!(window.stop, WindowStop::Overflow);
    }

    #[tokio::test]
    async fn overflow_does_not_skip_to_older_messages() {
        let store = InMemoryStore::new();
        // oldest small, middle huge, newest small
        let chat = chat_with(&store, &[5, 900, 5, 5]).await;
        let window = fetch_window(&store, &WordTokenizer, chat, 400, None)
            .await
            .unwrap();
        let texts: Vec<&str> = window.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec![words(5), words(5)]);
    }

    #[tokio::test]
    async fn exact_fill_stops_without_another_page() {
        let store = InMemoryStore::new();
        let chat = chat_with(&store, &[50, 50]).await;
        let window = fetch_window(&store, &WordTokenizer, chat, 100, None)
            .await
            .unwrap();
        assert_eq!(window.tokens, 100);
        assert_eq!(window.stop, WindowStop::BudgetFilled);
        assert_eq!(window.pages, 1);
    }

    #[tokio::test]
    async fn walks_multiple_pages() {
        let store = InMemoryStore::new();
        let sizes = vec![1; 250];
        let chat = chat_with(&store, &sizes).await;
        let window = fetch_window(&store, &WordTokenizer, chat, 10_000, None)
            .await
            .unwrap();
        assert_eq!(window.messages.len(), 250);
        assert_eq!(window.pages, 4);
        assert_eq!(window.stop, WindowStop::Exhausted);
    }

    #[tokio::test]
    async fn uses_canonical_text() {
        let store = InMemoryStore::new();
        let chat = chat_with(&store, &[1, 1]).await;
        let newest = store.fetch_before(chat, 1, None).await.unwrap()[0].id;
        store.insert_candidate(newest, &words(40)).await.unwrap();

        let window = fetch_window(&store, &WordTokenizer, chat, 1000, None)
            .await
            .unwrap();
        assert_eq!(window.tokens, 41);
    }

    #[tokio::test]
    async fn respects_before_bound() {
        let store = InMemoryStore::new();
        let chat = chat_with(&store, &[1, 1, 1, 1]).await;
        let all = store.fetch_before(chat, 10, None).await.unwrap();
        let bound = all[1].id;
        let window = fetch_window(&store, &WordTokenizer, chat, 1000, Some(bound))
            .await
            .unwrap();
        assert_eq!(window.messages.len(), 2);
        assert!(window.messages.iter().all(|m| m.id < bound));
    }
}
