pub mod assistant;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod models;
pub mod server;
pub mod storage;

use cli::Args;
use log::info;
use server::{ ChatContext, Server };
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("HTTP API Port: {}", args.http_port.map(|p| p.to_string()).unwrap_or_else(|| "disabled".to_string()));
    info!("Storage Type: {}", args.storage_type);
    match args.storage_type.to_lowercase().as_str() {
        "file" => info!("Storage Path: {}", args.storage_path),
        "redis" => {
            info!("Storage Redis URL: {}", args.storage_redis_url);
            info!("Storage Redis Prefix: {}", args.storage_redis_prefix);
        }
        _ => {}
    }
    info!("Storage Key: {}", args.storage_key);
    info!("Reply Delay: {}..{} ms", args.reply_delay_min_ms, args.reply_delay_max_ms);
    info!("Handshake Auth: {}", if args.server_api_key.is_some() { "enabled" } else { "disabled" });
    info!("-------------------------");

    let storage = storage::initialize_store(&args)?;
    let context = ChatContext::from_args(&args, storage);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, context, args);
    server.run().await?;

    Ok(())
}
