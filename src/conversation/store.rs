use chrono::{ DateTime, SubsecRound, Utc };
use log::{ debug, info, warn };
use std::sync::Arc;

use crate::assistant::greeting::seed_message;
use crate::models::chat::{ ChatMessage, Originator };
use crate::storage::KeyValueStore;

pub const UNREAD_CAP: u8 = 99;
const BADGE_LIMIT: u8 = 9;

/// Bot messages that arrived while the widget was collapsed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnreadCounter(u8);

impl UnreadCounter {
    pub fn count(&self) -> u8 {
        self.0
    }

    pub fn increment(&mut self) {
        self.0 = self.0.saturating_add(1).min(UNREAD_CAP);
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    /// Label for the launcher badge: nothing when zero, "9+" past nine.
    pub fn badge(&self) -> Option<String> {
        match self.0 {
            0 => None,
            n if n > BADGE_LIMIT => Some(format!("{}+", BADGE_LIMIT)),
            n => Some(n.to_string()),
        }
    }
}

/// Timestamps are kept at millisecond precision, the precision they are
/// persisted with.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Append-only conversation log for one widget, mirrored to a key of a
/// [`KeyValueStore`] after every mutation.
pub struct ConversationStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    messages: Vec<ChatMessage>,
    unread: UnreadCounter,
    open: bool,
    pending_replies: usize,
    last_id: i64,
}

impl ConversationStore {
    /// Loads the conversation stored under `key`, or starts a new one with a
    /// greeting for `path` when nothing usable is stored. A new greeting is
    /// written back so the next restore sees the same conversation.
    pub async fn restore(storage: Arc<dyn KeyValueStore>, key: &str, path: &str) -> Self {
        Self::open_conversation(storage, key, path, true).await
    }

    /// Like [`ConversationStore::restore`], but a generated greeting is not
    /// written to storage.
    pub async fn peek(storage: Arc<dyn KeyValueStore>, key: &str, path: &str) -> Self {
        Self::open_conversation(storage, key, path, false).await
    }

    async fn open_conversation(
        storage: Arc<dyn KeyValueStore>,
        key: &str,
        path: &str,
        persist_seed: bool
    ) -> Self {
        let mut store = Self {
            storage,
            key: key.to_string(),
            messages: Vec::new(),
            unread: UnreadCounter::default(),
            open: false,
            pending_replies: 0,
            last_id: 0,
        };

        match store.load().await {
            Some(messages) => {
                debug!("Restored {} messages from '{}'", messages.len(), store.key);
                // Ids claiming to be later than their own timestamp are ignored.
                store.last_id = messages
                    .iter()
                    .filter_map(|m| m.id.parse::<i64>().ok().filter(|id| *id <= m.timestamp.timestamp_millis()))
                    .max()
                    .unwrap_or(0);
                store.messages = messages;
            }
            None => {
                info!("Starting a new conversation under '{}'", store.key);
                let seed = seed_message(path, now_millis());
                store.last_id = seed.id.parse().unwrap_or(0);
                store.messages = vec![seed];
                if persist_seed {
                    store.persist().await;
                }
            }
        }
        store
    }

    async fn load(&self) -> Option<Vec<ChatMessage>> {
        let raw = match self.storage.read(&self.key).await {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => {
                return None;
            }
            Err(e) => {
                warn!("Failed to read conversation '{}': {}", self.key, e);
                return None;
            }
        };

        match serde_json::from_slice::<Vec<ChatMessage>>(&raw) {
            Ok(messages) if !messages.is_empty() => Some(messages),
            Ok(_) => None,
            Err(e) => {
                warn!("Discarding unreadable conversation '{}': {}", self.key, e);
                None
            }
        }
    }

    /// Writes the whole conversation. Failures are logged and otherwise ignored;
    /// the in-memory conversation stays usable.
    pub async fn persist(&self) {
        let bytes = match serde_json::to_vec(&self.messages) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to serialize conversation '{}': {}", self.key, e);
                return;
            }
        };
        if let Err(e) = self.storage.write(&self.key, &bytes).await {
            warn!("Failed to persist conversation '{}': {}", self.key, e);
        }
    }

    pub async fn append(&mut self, text: impl Into<String>, originator: Originator) -> ChatMessage {
        let timestamp = now_millis();
        let message = ChatMessage {
            id: self.next_id(timestamp),
            text: text.into(),
            originator,
            timestamp,
        };
        self.messages.push(message.clone());
        if originator.is_bot() && !self.open {
            self.unread.increment();
        }
        self.persist().await;
        message
    }

    // Millisecond clock ids, bumped when two messages land in the same tick.
    fn next_id(&mut self, timestamp: DateTime<Utc>) -> String {
        let id = timestamp.timestamp_millis().max(self.last_id.saturating_add(1));
        self.last_id = id;
        id.to_string()
    }

    pub fn all(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
        self.unread.reset();
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn toggle(&mut self) {
        if self.open { self.close() } else { self.open() }
    }

    pub fn unread(&self) -> UnreadCounter {
        self.unread
    }

    pub fn is_composing(&self) -> bool {
        self.pending_replies > 0
    }

    pub fn begin_reply(&mut self) {
        self.pending_replies += 1;
    }

    pub fn finish_reply(&mut self) {
        self.pending_replies = self.pending_replies.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ MemoryStore, StorageError };
    use async_trait::async_trait;

    const KEY: &str = "mlf_chat_v2_restricted";

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn read(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "quota").into())
        }

        async fn write(&self, _key: &str, _value: &[u8]) -> Result<(), StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "quota").into())
        }
    }

    #[tokio::test]
    async fn empty_storage_starts_with_a_greeting() {
        let storage = Arc::new(MemoryStore::new());
        let store = ConversationStore::restore(storage.clone(), KEY, "/products").await;

        assert_eq!(store.all().len(), 1);
        assert!(store.all()[0].is_bot());
        assert!(store.all()[0].text.contains("You are on the Products page."));
        assert!(storage.read(KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_json_falls_back_to_a_greeting() {
        let storage = Arc::new(MemoryStore::new());
        storage.write(KEY, b"{not json").await.unwrap();

        let store = ConversationStore::restore(storage.clone(), KEY, "/").await;
        assert_eq!(store.all().len(), 1);
        assert!(store.all()[0].text.contains("Welcome to Magnum\u{2011}Lima Fish."));
    }

    #[tokio::test]
    async fn bad_timestamps_fall_back_to_a_greeting() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .write(KEY, br#"[{"id":"1","text":"hi","isBot":false,"timestamp":"not a date"}]"#).await
            .unwrap();

        let store = ConversationStore::restore(storage, KEY, "/").await;
        assert_eq!(store.all().len(), 1);
        assert!(store.all()[0].is_bot());
    }

    #[tokio::test]
    async fn empty_value_falls_back_to_a_greeting() {
        let storage = Arc::new(MemoryStore::new());
        storage.write(KEY, b"").await.unwrap();

        let store = ConversationStore::restore(storage.clone(), KEY, "/contact").await;
        assert_eq!(store.all().len(), 1);
        assert!(store.all()[0].is_bot());
        assert!(store.all()[0].text.contains("You are on the Contact page."));
        assert!(!storage.read(KEY).await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_array_falls_back_to_a_greeting() {
        let storage = Arc::new(MemoryStore::new());
        storage.write(KEY, b"[]").await.unwrap();

        let store = ConversationStore::restore(storage.clone(), KEY, "/solutions").await;
        assert_eq!(store.all().len(), 1);
        assert!(store.all()[0].is_bot());
        assert!(store.all()[0].text.contains("You are on the Solutions page."));

        let raw = storage.read(KEY).await.unwrap().unwrap();
        let stored: Vec<ChatMessage> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored, store.all());
    }

    #[tokio::test]
    async fn unreadable_storage_falls_back_to_a_greeting() {
        let store = ConversationStore::restore(Arc::new(BrokenStore), KEY, "/products").await;
        assert_eq!(store.all().len(), 1);
        assert!(store.all()[0].is_bot());
        assert!(store.all()[0].text.contains("You are on the Products page."));
    }

    #[tokio::test]
    async fn peek_does_not_write_a_greeting() {
        let storage = Arc::new(MemoryStore::new());
        let store = ConversationStore::peek(storage.clone(), KEY, "/").await;

        assert_eq!(store.all().len(), 1);
        assert_eq!(storage.read(KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_stored_ids_do_not_overflow() {
        let storage = Arc::new(MemoryStore::new());
        let raw = format!(
            r#"[{{"id":"{}","text":"hi","isBot":true,"timestamp":"2024-05-01T10:00:00.000Z"}}]"#,
            i64::MAX
        );
        storage.write(KEY, raw.as_bytes()).await.unwrap();

        let mut store = ConversationStore::restore(storage, KEY, "/").await;
        let first = store.append("hello", Originator::User).await;
        let second = store.append("again", Originator::User).await;

        let first_id: i64 = first.id.parse().unwrap();
        let second_id: i64 = second.id.parse().unwrap();
        assert!(first_id < i64::MAX);
        assert!(first_id < second_id);
    }

    #[tokio::test]
    async fn id_bump_saturates_at_the_top() {
        let mut store = ConversationStore::restore(Arc::new(MemoryStore::new()), KEY, "/").await;
        store.last_id = i64::MAX;
        assert_eq!(store.next_id(now_millis()), i64::MAX.to_string());
    }

    #[tokio::test]
    async fn persisted_conversation_round_trips() {
        let storage = Arc::new(MemoryStore::new());
        let mut store = ConversationStore::restore(storage.clone(), KEY, "/").await;
        store.append("Where do you ship?", Originator::User).await;
        store.append("We ship locally.", Originator::Bot).await;

        let restored = ConversationStore::restore(storage, KEY, "/contact").await;
        assert_eq!(restored.all(), store.all());
    }

    #[tokio::test]
    async fn restore_is_idempotent() {
        let storage = Arc::new(MemoryStore::new());
        let first = ConversationStore::restore(storage.clone(), KEY, "/").await;
        let second = ConversationStore::restore(storage.clone(), KEY, "/").await;
        assert_eq!(first.all(), second.all());
    }

    #[tokio::test]
    async fn ids_strictly_increase() {
        let storage = Arc::new(MemoryStore::new());
        let mut store = ConversationStore::restore(storage, KEY, "/").await;
        for i in 0..20 {
            store.append(format!("message {}", i), Originator::User).await;
        }
        let ids: Vec<i64> = store.all().iter().map(|m| m.id.parse().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids not increasing: {:?}", ids);
    }

    #[tokio::test]
    async fn storage_failures_are_swallowed() {
        let mut store = ConversationStore::restore(Arc::new(BrokenStore), KEY, "/").await;
        store.append("hello", Originator::User).await;
        assert_eq!(store.all().len(), 2);
    }

    #[tokio::test]
    async fn unread_counts_bot_messages_while_closed() {
        let mut store = ConversationStore::restore(Arc::new(MemoryStore::new()), KEY, "/").await;
        store.append("hi", Originator::User).await;
        assert_eq!(store.unread().count(), 0);

        store.append("answer", Originator::Bot).await;
        assert_eq!(store.unread().count(), 1);
        assert_eq!(store.unread().badge(), Some("1".to_string()));

        store.open();
        assert_eq!(store.unread().count(), 0);
        store.append("answer", Originator::Bot).await;
        assert_eq!(store.unread().count(), 0);
    }

    #[test]
    fn unread_counter_is_capped() {
        let mut counter = UnreadCounter::default();
        assert_eq!(counter.badge(), None);
        for _ in 0..9 {
            counter.increment();
        }
        assert_eq!(counter.badge(), Some("9".to_string()));
        for _ in 0..500 {
            counter.increment();
        }
        assert_eq!(counter.count(), UNREAD_CAP);
        assert_eq!(counter.badge(), Some("9+".to_string()));
        counter.reset();
        assert_eq!(counter.count(), 0);
    }

    #[tokio::test]
    async fn toggle_flips_visibility() {
        let mut store = ConversationStore::restore(Arc::new(MemoryStore::new()), KEY, "/").await;
        assert!(!store.is_open());
        store.toggle();
        assert!(store.is_open());
        store.toggle();
        assert!(!store.is_open());
    }
}
