pub mod api;
pub mod websocket;

use crate::cli::Args;
use crate::conversation::ReplyDelay;
use crate::storage::KeyValueStore;
use std::error::Error;
use std::sync::Arc;

const MAX_SESSION_ID_LEN: usize = 64;

/// What every connection needs to open a conversation.
#[derive(Clone)]
pub struct ChatContext {
    pub storage: Arc<dyn KeyValueStore>,
    pub storage_key: String,
    pub delay: ReplyDelay,
}

impl ChatContext {
    pub fn new(storage: Arc<dyn KeyValueStore>, storage_key: &str, delay: ReplyDelay) -> Self {
        Self {
            storage,
            storage_key: storage_key.to_string(),
            delay,
        }
    }

    pub fn from_args(args: &Args, storage: Arc<dyn KeyValueStore>) -> Self {
        Self::new(
            storage,
            &args.storage_key,
            ReplyDelay::from_millis(args.reply_delay_min_ms, args.reply_delay_max_ms)
        )
    }

    pub fn conversation_key(&self, session_id: &str) -> String {
        format!("{}:{}", self.storage_key, session_id)
    }
}

/// Session ids come from clients and end up in storage keys.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty() &&
        id.len() <= MAX_SESSION_ID_LEN &&
        id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub struct Server {
    addr: String,
    context: ChatContext,
    args: Args,
}

impl Server {
    pub fn new(addr: String, context: ChatContext, args: Args) -> Self {
        Self {
            addr,
            context,
            args,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_port) = self.args.http_port {
            api::start_http_server(http_port, self.context.clone()).await?;
        }

        websocket::start_ws_server(
            &self.addr,
            self.context.clone(),
            self.args.server_api_key.clone()
        ).await
    }
}
