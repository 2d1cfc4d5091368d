use crate::assistant::matcher;
use crate::conversation::{ ChatSession, ConversationStore, SessionEvent };
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::server::{ is_valid_session_id, ChatContext };

use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;

use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };

use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response, ErrorResponse };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use hmac::{ Hmac, Mac };
use sha2::Sha256;
use chrono::Utc;
use url::form_urlencoded;

use log::{ info, warn, error, debug };
use futures::stream::SplitSink;
use futures::{ SinkExt, StreamExt };
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;
type WsSink<S> = SplitSink<WebSocketStream<S>, Message>;

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;
const MAX_CLOCK_SKEW_SECS: u64 = 300;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::MIN.saturating_add(9)));
}

/// Handshake query parameters that select the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub session_id: String,
    pub path: String,
}

impl ConnectParams {
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let session_id = match params.get("session") {
            Some(id) if is_valid_session_id(id) => id.clone(),
            _ => Uuid::new_v4().to_string(),
        };
        let path = params
            .get("path")
            .filter(|p| p.starts_with('/'))
            .cloned()
            .unwrap_or_else(|| "/".to_string());
        Self { session_id, path }
    }
}

/// Checks `sig == hex(hmac_sha256(secret, ts))` with `ts` within five minutes of `now`.
pub fn verify_signature(
    secret: &str,
    params: &HashMap<String, String>,
    now: i64
) -> Result<(), &'static str> {
    let ts = params.get("ts").or_else(|| params.get("X-Api-Ts"));
    let sig = params.get("sig").or_else(|| params.get("X-Api-Sign"));
    let (ts, sig) = match (ts, sig) {
        (Some(ts), Some(sig)) => (ts, sig),
        _ => {
            return Err("missing ts/sig");
        }
    };

    let ts_i: i64 = ts.parse().map_err(|_| "bad timestamp")?;
    if now.abs_diff(ts_i) > MAX_CLOCK_SKEW_SECS {
        return Err("timestamp out of range");
    }

    let expected = hex::decode(sig).map_err(|_| "bad signature")?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "bad signature")?;
    mac.update(ts.as_bytes());
    mac.verify_slice(&expected).map_err(|_| "bad signature")
}

fn reject(reason: &str) -> ErrorResponse {
    let mut res = ErrorResponse::new(Some(reason.to_string()));
    *res.status_mut() = StatusCode::UNAUTHORIZED;
    res
}

pub async fn start_ws_server(
    addr: &str,
    context: ChatContext,
    api_key: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("WS server listening on: {}", addr);
    serve(listener, context, api_key).await
}

pub async fn serve(
    listener: TcpListener,
    context: ChatContext,
    api_key: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let context = context.clone();
        let required_api_key = api_key.clone();

        tokio::spawn(async move {
            if let Err(e) = process_connection(peer, stream, context, required_api_key).await {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    context: ChatContext,
    required_api_key: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let mut connect_params = None;
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let qs = req.uri().query().unwrap_or("");
        let params: HashMap<String, String> = form_urlencoded
            ::parse(qs.as_bytes())
            .into_owned()
            .collect();

        if let Some(secret) = required_api_key.as_deref().filter(|k| !k.is_empty()) {
            if let Err(reason) = verify_signature(secret, &params, Utc::now().timestamp()) {
                warn!("Rejecting handshake from {}: {}", peer, reason);
                return Err(reject(reason));
            }
        }

        connect_params = Some(ConnectParams::from_query(&params));
        Ok(response)
    };

    let handshake = accept_hdr_async(stream, auth_callback).await;
    match handshake {
        Ok(ws) => {
            let params = connect_params.unwrap_or_else(|| ConnectParams::from_query(&HashMap::new()));
            handle_connection(peer, ws, context, params).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

async fn send_message<S>(tx: &mut WsSink<S>, msg: &ServerMessage) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json)).await?;
    Ok(())
}

fn event_to_message(event: SessionEvent) -> ServerMessage {
    match event {
        SessionEvent::Appended(message) => ServerMessage::Message { message },
        SessionEvent::Composing(composing) => ServerMessage::Typing { composing },
        SessionEvent::Unread { count, badge } => ServerMessage::Unread { count, badge },
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    context: ChatContext,
    params: ConnectParams
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let key = context.conversation_key(&params.session_id);
    info!("Session {} for {} (path {})", params.session_id, peer, params.path);

    let store = ConversationStore::restore(context.storage.clone(), &key, &params.path).await;
    let (mut session, mut events) = ChatSession::new(store, context.delay);
    let (mut tx, mut rx) = websocket.split();

    let history = ServerMessage::History {
        messages: session.history().await,
        quick_replies: matcher::quick_replies(),
    };
    if let Err(e) = send_message(&mut tx, &history).await {
        error!("Failed to send history to {}: {}", peer, e);
        return;
    }

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                if let Err(e) = send_message(&mut tx, &event_to_message(event)).await {
                    error!("Error sending event to {}: {}", peer, e);
                    break;
                }
            }
            incoming = rx.next() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        info!("WebSocket connection closed or errored for {}: {}", peer, e);
                        break;
                    }
                    None => break,
                };

                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let error_msg = ServerMessage::Error {
                        message: "Message too large".to_string(),
                    };
                    let _ = send_message(&mut tx, &error_msg).await;
                    break;
                }

                match message {
                    Message::Text(text) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Chat { content }) => {
                                if session.submit(&content).await.is_none() {
                                    debug!("Ignoring blank message from {}", peer);
                                }
                                None
                            }
                            Ok(ClientMessage::QuickReply { index }) => {
                                match session.submit_quick_reply(index).await {
                                    Some(_) => None,
                                    None => Some(ServerMessage::Error {
                                        message: format!("Unknown quick reply {}", index),
                                    }),
                                }
                            }
                            Ok(ClientMessage::Open) => {
                                session.open().await;
                                None
                            }
                            Ok(ClientMessage::Close) => {
                                session.close().await;
                                None
                            }
                            Err(e) => {
                                warn!("Failed to parse message from {}: {}", peer, e);
                                Some(ServerMessage::Error {
                                    message: format!("Failed to parse message: {}", e),
                                })
                            }
                        };
                        if let Some(reply) = reply {
                            if let Err(e) = send_message(&mut tx, &reply).await {
                                error!("Error sending error message to {}: {}", peer, e);
                                break;
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if tx.send(Message::Pong(ping_data)).await.is_err() {
                            error!("Failed to send pong to {}", peer);
                            break;
                        }
                    }
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Pong(_) | Message::Frame(_) => {}
                }
            }
        }
    }

    session.shutdown();
    info!("WebSocket connection closed for {} (session {})", peer, params.session_id);
}
