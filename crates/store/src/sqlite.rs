//! SQLite chat store.
//!
//! Uses a single SQLite database file with three tables:
//! - `chats`: one row per conversation, with the card it is played with
//! - `messages`: every turn; `AUTOINCREMENT` ids never get reused, so id
//!   order stays chronological even after deletes
//! - `candidates`: alternative replies for character messages
//!
//! Foreign keys do the cascading: deleting a message removes its candidates,
//! and deleting a candidate clears any prime pointer aimed at it. Every
//! mutating method is a single statement or a single transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::error::StorageError;
use parley_core::message::{Candidate, CandidateId, Chat, ChatId, EditTarget, Message, MessageId};
use parley_core::store::{ChatStore, InsertedPair};
use parley_core::{CardData, Sender};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed chat store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a store at a file path.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection, so keep exactly one.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite chat store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create tables and indexes if they do not exist yet.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                card        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("chats table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id             INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                sender              TEXT NOT NULL CHECK (sender IN ('user', 'character')),
                text                TEXT NOT NULL,
                inserted_at         TEXT NOT NULL,
                prime_candidate_id  INTEGER REFERENCES candidates(id) ON DELETE SET NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candidates (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id  INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                text        TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("candidates table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id, id DESC)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_candidates_message_id ON candidates(message_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("candidates index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn parse_timestamp(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    /// Parse a `Message` (without candidates) from a row.
    fn row_to_message(row: &SqliteRow) -> Result<Message, StorageError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StorageError::QueryFailed(format!("id column: {e}")))?;
        let chat_id: i64 = row
            .try_get("chat_id")
            .map_err(|e| StorageError::QueryFailed(format!("chat_id column: {e}")))?;
        let sender: String = row
            .try_get("sender")
            .map_err(|e| StorageError::QueryFailed(format!("sender column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| StorageError::QueryFailed(format!("text column: {e}")))?;
        let inserted_at: String = row
            .try_get("inserted_at")
            .map_err(|e| StorageError::QueryFailed(format!("inserted_at column: {e}")))?;
        let prime: Option<i64> = row
            .try_get("prime_candidate_id")
            .map_err(|e| StorageError::QueryFailed(format!("prime_candidate_id column: {e}")))?;

        let sender = Sender::from_str(&sender)
            .map_err(|e| StorageError::QueryFailed(format!("sender column: {e}")))?;

        Ok(Message {
            id: MessageId(id),
            chat_id: ChatId(chat_id),
            sender,
            text,
            inserted_at: Self::parse_timestamp(&inserted_at),
            prime_candidate_id: prime.map(CandidateId),
            candidates: Vec::new(),
        })
    }

    fn row_to_candidate(row: &SqliteRow) -> Result<Candidate, StorageError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StorageError::QueryFailed(format!("candidate id column: {e}")))?;
        let message_id: i64 = row
            .try_get("message_id")
            .map_err(|e| StorageError::QueryFailed(format!("message_id column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| StorageError::QueryFailed(format!("candidate text column: {e}")))?;
        Ok(Candidate {
            id: CandidateId(id),
            message_id: MessageId(message_id),
            text,
        })
    }

    fn row_to_chat(row: &SqliteRow) -> Result<Chat, StorageError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StorageError::QueryFailed(format!("chat id column: {e}")))?;
        let card_json: String = row
            .try_get("card")
            .map_err(|e| StorageError::QueryFailed(format!("card column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StorageError::QueryFailed(format!("created_at column: {e}")))?;
        let card: CardData = serde_json::from_str(&card_json)
            .map_err(|e| StorageError::QueryFailed(format!("card of chat {id}: {e}")))?;
        Ok(Chat {
            id: ChatId(id),
            card,
            created_at: Self::parse_timestamp(&created_at),
        })
    }

    /// Attach candidate rows to their messages, preserving candidate order.
    fn attach_candidates(messages: &mut [Message], candidates: Vec<Candidate>) {
        let mut by_message: HashMap<MessageId, Vec<Candidate>> = HashMap::new();
        for candidate in candidates {
            by_message
                .entry(candidate.message_id)
                .or_default()
                .push(candidate);
        }
        for message in messages.iter_mut() {
            if let Some(list) = by_message.remove(&message.id) {
                message.candidates = list;
            }
        }
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_chat(&self, card: &CardData) -> Result<ChatId, StorageError> {
        let card_json = serde_json::to_string(card)
            .map_err(|e| StorageError::Storage(format!("Card serialization: {e}")))?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Storage(format!("BEGIN failed: {e}")))?;

        let chat_id = sqlx::query("INSERT INTO chats (card, created_at) VALUES (?1, ?2)")
            .bind(&card_json)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Storage(format!("INSERT chat failed: {e}")))?
            .last_insert_rowid();

        let greeting = card.character.greeting.trim();
        if !greeting.is_empty() {
            sqlx::query(
                "INSERT INTO messages (chat_id, sender, text, inserted_at) VALUES (?1, 'character', ?2, ?3)",
            )
            .bind(chat_id)
            .bind(greeting)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Storage(format!("INSERT greeting failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(chat_id, "Created chat");
        Ok(ChatId(chat_id))
    }

    async fn get_chat(&self, chat_id: ChatId) -> Result<Option<Chat>, StorageError> {
        let row = sqlx::query("SELECT id, card, created_at FROM chats WHERE id = ?1")
            .bind(chat_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("SELECT chat failed: {e}")))?;
        row.as_ref().map(Self::row_to_chat).transpose()
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, StorageError> {
        let rows = sqlx::query("SELECT id, card, created_at FROM chats ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("SELECT chats failed: {e}")))?;
        rows.iter().map(Self::row_to_chat).collect()
    }

    async fn chat_exists(&self, chat_id: ChatId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM chats WHERE id = ?1")
            .bind(chat_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("chat_exists failed: {e}")))?;
        Ok(row.is_some())
    }

    async fn fetch_before(
        &self,
        chat_id: ChatId,
        limit: usize,
        before: Option<MessageId>,
    ) -> Result<Vec<Message>, StorageError> {
        let before = before.map(|id| id.0);
        let limit = limit as i64;

        // Messages and candidates are read in one transaction so a
        // concurrent rewind cannot split them.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Storage(format!("BEGIN failed: {e}")))?;

        let rows = sqlx::query(
            r#"
            SELECT id, chat_id, sender, text, inserted_at, prime_candidate_id
            FROM messages
            WHERE chat_id = ?1 AND (?2 IS NULL OR id < ?2)
            ORDER BY id DESC
            LIMIT ?3
            "#,
        )
        .bind(chat_id.0)
        .bind(before)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("fetch_before failed: {e}")))?;

        let mut messages = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>, _>>()?;

        if messages.is_empty() {
            return Ok(messages);
        }

        let candidate_rows = sqlx::query(
            r#"
            SELECT id, message_id, text
            FROM candidates
            WHERE message_id IN (
                SELECT id FROM messages
                WHERE chat_id = ?1 AND (?2 IS NULL OR id < ?2)
                ORDER BY id DESC
                LIMIT ?3
            )
            ORDER BY id ASC
            "#,
        )
        .bind(chat_id.0)
        .bind(before)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("candidates for page failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Storage(format!("COMMIT failed: {e}")))?;

        let candidates = candidate_rows
            .iter()
            .map(Self::row_to_candidate)
            .collect::<Result<Vec<_>, _>>()?;
        Self::attach_candidates(&mut messages, candidates);

        Ok(messages)
    }

    async fn get_message(&self, message_id: MessageId) -> Result<Option<Message>, StorageError> {
        let row = sqlx::query(
            "SELECT id, chat_id, sender, text, inserted_at, prime_candidate_id FROM messages WHERE id = ?1",
        )
        .bind(message_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("SELECT message failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut message = Self::row_to_message(&row)?;

        let candidate_rows =
            sqlx::query("SELECT id, message_id, text FROM candidates WHERE message_id = ?1 ORDER BY id ASC")
                .bind(message_id.0)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::QueryFailed(format!("SELECT candidates failed: {e}")))?;
        message.candidates = candidate_rows
            .iter()
            .map(Self::row_to_candidate)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(message))
    }

    async fn insert_pair(
        &self,
        chat_id: ChatId,
        user_text: &str,
        character_text: &str,
    ) -> Result<InsertedPair, StorageError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Storage(format!("BEGIN failed: {e}")))?;

        let user_id = sqlx::query(
            "INSERT INTO messages (chat_id, sender, text, inserted_at) VALUES (?1, 'user', ?2, ?3)",
        )
        .bind(chat_id.0)
        .bind(user_text)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Storage(format!("INSERT user message failed: {e}")))?
        .last_insert_rowid();

        let character_id = sqlx::query(
            "INSERT INTO messages (chat_id, sender, text, inserted_at) VALUES (?1, 'character', ?2, ?3)",
        )
        .bind(chat_id.0)
        .bind(character_text)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Storage(format!("INSERT character message failed: {e}")))?
        .last_insert_rowid();

        tx.commit()
            .await
            .map_err(|e| StorageError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(chat_id = chat_id.0, user_id, character_id, "Inserted message pair");
        Ok(InsertedPair {
            user_id: MessageId(user_id),
            character_id: MessageId(character_id),
        })
    }

    async fn insert_candidate(
        &self,
        message_id: MessageId,
        text: &str,
    ) -> Result<CandidateId, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Storage(format!("BEGIN failed: {e}")))?;

        let candidate_id =
            sqlx::query("INSERT INTO candidates (message_id, text) VALUES (?1, ?2)")
                .bind(message_id.0)
                .bind(text)
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::Storage(format!("INSERT candidate failed: {e}")))?
                .last_insert_rowid();

        let updated = sqlx::query("UPDATE messages SET prime_candidate_id = ?1 WHERE id = ?2")
            .bind(candidate_id)
            .bind(message_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Storage(format!("UPDATE prime failed: {e}")))?
            .rows_affected();

        if updated == 0 {
            // Dropping the transaction rolls the candidate back.
            return Err(StorageError::NotFound(format!("message {message_id}")));
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(message_id = message_id.0, candidate_id, "Inserted prime candidate");
        Ok(CandidateId(candidate_id))
    }

    async fn set_prime(
        &self,
        message_id: MessageId,
        candidate_id: Option<CandidateId>,
    ) -> Result<bool, StorageError> {
        let result = match candidate_id {
            Some(candidate_id) => sqlx::query(
                r#"
                UPDATE messages SET prime_candidate_id = ?2
                WHERE id = ?1
                  AND EXISTS (SELECT 1 FROM candidates WHERE id = ?2 AND message_id = ?1)
                "#,
            )
            .bind(message_id.0)
            .bind(candidate_id.0)
            .execute(&self.pool)
            .await,
            None => sqlx::query("UPDATE messages SET prime_candidate_id = NULL WHERE id = ?1")
                .bind(message_id.0)
                .execute(&self.pool)
                .await,
        };

        let affected = result
            .map_err(|e| StorageError::Storage(format!("UPDATE prime failed: {e}")))?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn update_text(&self, target: EditTarget, text: &str) -> Result<bool, StorageError> {
        let result = match target {
            EditTarget::Message(id) => sqlx::query("UPDATE messages SET text = ?1 WHERE id = ?2")
                .bind(text)
                .bind(id.0)
                .execute(&self.pool)
                .await,
            EditTarget::Candidate(id) => {
                sqlx::query("UPDATE candidates SET text = ?1 WHERE id = ?2")
                    .bind(text)
                    .bind(id.0)
                    .execute(&self.pool)
                    .await
            }
        };

        let affected = result
            .map_err(|e| StorageError::Storage(format!("UPDATE text failed: {e}")))?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<bool, StorageError> {
        let affected = sqlx::query("DELETE FROM messages WHERE id = ?1")
            .bind(message_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Storage(format!("DELETE message failed: {e}")))?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn delete_after(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<u64, StorageError> {
        let affected = sqlx::query("DELETE FROM messages WHERE chat_id = ?1 AND id > ?2")
            .bind(chat_id.0)
            .bind(message_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Storage(format!("DELETE after failed: {e}")))?
            .rows_affected();
        debug!(chat_id = chat_id.0, message_id = message_id.0, affected, "Rewound chat");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    fn card_with_greeting(greeting: &str) -> CardData {
        let mut card = CardData::named("Saku");
        card.character.greeting = greeting.into();
        card
    }

    async fn count_candidates(store: &SqliteStore) -> i64 {
        sqlx::query("SELECT COUNT(*) AS n FROM candidates")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("n")
    }

    #[tokio::test]
    async fn create_chat_seeds_greeting() {
        let store = test_store().await;
        let chat = store
            .create_chat(&card_with_greeting("Welcome, traveler."))
            .await
            .unwrap();

        assert!(store.chat_exists(chat).await.unwrap());
        let messages = store.fetch_before(chat, 10, None).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Character);
        assert_eq!(messages[0].text, "Welcome, traveler.");

        let stored = store.get_chat(chat).await.unwrap().unwrap();
        assert_eq!(stored.card.character.name, "Saku");
    }

    #[tokio::test]
    async fn create_chat_without_greeting_is_empty() {
        let store = test_store().await;
        let chat = store.create_chat(&card_with_greeting("  ")).await.unwrap();
        assert!(store.fetch_before(chat, 10, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_chat_does_not_exist() {
        let store = test_store().await;
        assert!(!store.chat_exists(ChatId(42)).await.unwrap());
        assert!(store.get_chat(ChatId(42)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_before_pages_newest_first() {
        let store = test_store().await;
        let chat = store.create_chat(&card_with_greeting("")).await.unwrap();
        for i in 0..3 {
            store
                .insert_pair(chat, &format!("u{i}"), &format!("c{i}"))
                .await
                .unwrap();
        }

        let first = store.fetch_before(chat, 4, None).await.unwrap();
        let texts: Vec<&str> = first.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["c2", "u2", "c1", "u1"]);

        let cursor = first.last().unwrap().id;
        let second = store.fetch_before(chat, 4, Some(cursor)).await.unwrap();
        let texts: Vec<&str> = second.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["c0", "u0"]);

        let cursor = second.last().unwrap().id;
        assert!(store.fetch_before(chat, 4, Some(cursor)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_before_is_scoped_to_chat() {
        let store = test_store().await;
        let a = store.create_chat(&card_with_greeting("")).await.unwrap();
        let b = store.create_chat(&card_with_greeting("")).await.unwrap();
        store.insert_pair(a, "hello a", "hi a").await.unwrap();
        store.insert_pair(b, "hello b", "hi b").await.unwrap();

        let messages = store.fetch_before(a, 100, None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.chat_id == a));
    }

    #[tokio::test]
    async fn insert_candidate_becomes_prime() {
        let store = test_store().await;
        let chat = store.create_chat(&card_with_greeting("")).await.unwrap();
        let pair = store.insert_pair(chat, "Hey", "Hi").await.unwrap();

        let first = store
            .insert_candidate(pair.character_id, "Hello there")
            .await
            .unwrap();
        let second = store
            .insert_candidate(pair.character_id, "Oh, hi!")
            .await
            .unwrap();

        let message = store.get_message(pair.character_id).await.unwrap().unwrap();
        assert_eq!(message.candidates.len(), 2);
        assert_eq!(message.candidates[0].id, first);
        assert_eq!(message.prime_candidate_id, Some(second));
        assert_eq!(message.canonical_text(), "Oh, hi!");
        assert_eq!(message.text, "Hi");
    }

    #[tokio::test]
    async fn insert_candidate_for_missing_message_fails() {
        let store = test_store().await;
        let result = store.insert_candidate(MessageId(999), "orphan").await;
        assert!(result.is_err());
        assert_eq!(count_candidates(&store).await, 0);
    }

    #[tokio::test]
    async fn set_prime_rejects_foreign_candidate() {
        let store = test_store().await;
        let chat = store.create_chat(&card_with_greeting("")).await.unwrap();
        let one = store.insert_pair(chat, "a", "b").await.unwrap();
        let two = store.insert_pair(chat, "c", "d").await.unwrap();
        let foreign = store.insert_candidate(two.character_id, "d2").await.unwrap();

        assert!(!store.set_prime(one.character_id, Some(foreign)).await.unwrap());
        let message = store.get_message(one.character_id).await.unwrap().unwrap();
        assert_eq!(message.prime_candidate_id, None);
    }

    #[tokio::test]
    async fn set_prime_switches_and_clears() {
        let store = test_store().await;
        let chat = store.create_chat(&card_with_greeting("")).await.unwrap();
        let pair = store.insert_pair(chat, "a", "original").await.unwrap();
        let first = store.insert_candidate(pair.character_id, "first").await.unwrap();
        store.insert_candidate(pair.character_id, "second").await.unwrap();

        assert!(store.set_prime(pair.character_id, Some(first)).await.unwrap());
        let message = store.get_message(pair.character_id).await.unwrap().unwrap();
        assert_eq!(message.canonical_text(), "first");

        assert!(store.set_prime(pair.character_id, None).await.unwrap());
        let message = store.get_message(pair.character_id).await.unwrap().unwrap();
        assert_eq!(message.canonical_text(), "original");
    }

    #[tokio::test]
    async fn update_text_targets_only_candidate() {
        let store = test_store().await;
        let chat = store.create_chat(&card_with_greeting("")).await.unwrap();
        let pair = store.insert_pair(chat, "a", "own text").await.unwrap();
        let candidate = store.insert_candidate(pair.character_id, "draft").await.unwrap();

        assert!(store
            .update_text(EditTarget::Candidate(candidate), "polished")
            .await
            .unwrap());
        let message = store.get_message(pair.character_id).await.unwrap().unwrap();
        assert_eq!(message.text, "own text");
        assert_eq!(message.canonical_text(), "polished");

        assert!(!store
            .update_text(EditTarget::Message(MessageId(999)), "nothing")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn delete_message_cascades_candidates() {
        let store = test_store().await;
        let chat = store.create_chat(&card_with_greeting("")).await.unwrap();
        let pair = store.insert_pair(chat, "a", "b").await.unwrap();
        store.insert_candidate(pair.character_id, "b2").await.unwrap();

        assert!(store.delete_message(pair.character_id).await.unwrap());
        assert!(!store.delete_message(pair.character_id).await.unwrap());
        assert_eq!(count_candidates(&store).await, 0);

        let remaining = store.fetch_before(chat, 10, None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, pair.user_id);
    }

    #[tokio::test]
    async fn delete_after_keeps_cut_point() {
        let store = test_store().await;
        let chat = store.create_chat(&card_with_greeting("Hello")).await.unwrap();
        let first = store.insert_pair(chat, "u1", "c1").await.unwrap();
        let second = store.insert_pair(chat, "u2", "c2").await.unwrap();
        store.insert_candidate(second.character_id, "c2b").await.unwrap();

        let removed = store.delete_after(chat, first.character_id).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(count_candidates(&store).await, 0);

        let remaining = store.fetch_before(chat, 10, None).await.unwrap();
        let texts: Vec<&str> = remaining.iter().rev().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "u1", "c1"]);
    }

    #[tokio::test]
    async fn unknown_sender_row_is_query_failure() {
        let store = test_store().await;
        let chat = store.create_chat(&card_with_greeting("")).await.unwrap();
        sqlx::query("PRAGMA ignore_check_constraints = ON")
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO messages (chat_id, sender, text, inserted_at) VALUES (?1, 'narrator', 'x', ?2)",
        )
        .bind(chat.0)
        .bind(Utc::now().to_rfc3339())
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.fetch_before(chat, 10, None).await.unwrap_err();
        assert!(matches!(err, StorageError::QueryFailed(ref msg) if msg.contains("narrator")));
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = test_store().await;
        let chat = store.create_chat(&card_with_greeting("")).await.unwrap();
        let first = store.insert_pair(chat, "u1", "c1").await.unwrap();
        store.delete_after(chat, first.user_id).await.unwrap();
        let second = store.insert_pair(chat, "u2", "c2").await.unwrap();
        assert!(second.user_id > first.character_id);
    }

    #[tokio::test]
    async fn backend_name() {
        let store = test_store().await;
        assert_eq!(store.name(), "sqlite");
    }
}
