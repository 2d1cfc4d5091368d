mod file;
mod memory;
mod redis;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;

use crate::cli::Args;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
}

/// Whole-value key/value storage backing a conversation. Reads of a missing key
/// return `Ok(None)`; writes replace the previous value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

pub fn create_store(args: &Args) -> Result<Arc<dyn KeyValueStore>, Box<dyn Error + Send + Sync>> {
    match args.storage_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "file" => {
            let store = FileStore::new(&args.storage_path)?;
            Ok(Arc::new(store))
        }
        "redis" => {
            let store = RedisStore::new(&args.storage_redis_url, &args.storage_redis_prefix)?;
            Ok(Arc::new(store))
        }
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported storage type: {}", args.storage_type)
                    )
                )
            ),
    }
}

pub fn initialize_store(args: &Args) -> Result<Arc<dyn KeyValueStore>, Box<dyn Error + Send + Sync>> {
    let location = match args.storage_type.to_lowercase().as_str() {
        "file" => args.storage_path.clone(),
        "redis" => args.storage_redis_url.clone(),
        _ => "process memory".to_string(),
    };
    info!("Conversations will be stored in: {} at {}", args.storage_type, location);
    create_store(args)
}
