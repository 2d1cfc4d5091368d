use clap::Parser;
use crate::config::questions::DEFAULT_STORAGE_KEY;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Storage Args ---
    /// Conversation storage backend (memory, file, redis)
    #[arg(long, env = "STORAGE_TYPE", default_value = "memory")]
    pub storage_type: String,

    /// Directory holding one JSON file per conversation when using the file backend.
    #[arg(long, env = "STORAGE_PATH", default_value = "data/conversations")]
    pub storage_path: String,

    /// Redis endpoint for the redis backend (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "STORAGE_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub storage_redis_url: String,

    /// Prefix for Redis conversation keys.
    #[arg(long, env = "STORAGE_REDIS_PREFIX", default_value = "chat:")]
    pub storage_redis_prefix: String,

    /// Base key conversations are stored under. Each session appends ":<session id>".
    #[arg(long, env = "STORAGE_KEY", default_value = DEFAULT_STORAGE_KEY)]
    pub storage_key: String,

    // --- Reply pacing Args ---
    /// Shortest simulated typing delay before the assistant answers, in milliseconds.
    #[arg(long, env = "REPLY_DELAY_MIN_MS", default_value = "600")]
    pub reply_delay_min_ms: u64,

    /// Longest simulated typing delay before the assistant answers, in milliseconds.
    #[arg(long, env = "REPLY_DELAY_MAX_MS", default_value = "1300")]
    pub reply_delay_max_ms: u64,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP API. The API is disabled when unset.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional API Key required for clients to connect to the WebSocket server. If set, clients must sign their handshake with it.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,
}
