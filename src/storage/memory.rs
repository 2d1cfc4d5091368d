use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{ KeyValueStore, StorageError };

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_keys_read_as_none() {
        let store = MemoryStore::new();
        assert_eq!(store.read("nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_replace_the_whole_value() {
        let store = MemoryStore::new();
        store.write("chat", b"[1,2,3]").await.unwrap();
        store.write("chat", b"[]").await.unwrap();
        assert_eq!(store.read("chat").await.unwrap(), Some(b"[]".to_vec()));
    }
}
