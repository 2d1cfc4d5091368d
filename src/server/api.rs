use crate::assistant::matcher;
use crate::config::questions::ALLOWED_QUESTIONS;
use crate::conversation::ConversationStore;
use crate::models::chat::ChatMessage;
use crate::server::{ is_valid_session_id, ChatContext };
use std::error::Error;
use std::net::SocketAddr;
use axum::{
    routing::{ get, post },
    Router,
    extract::{ Path, Query, State },
    response::IntoResponse,
    http::StatusCode,
    Json,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Deserialize)]
pub struct AnswerRequest {
    pub question: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct AnswerResponse {
    pub matched: bool,
    pub answer: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct QuestionsResponse {
    pub questions: Vec<String>,
}

#[derive(Deserialize)]
pub struct ConversationQuery {
    pub path: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConversationResponse {
    pub id: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Clone)]
struct AppState {
    context: ChatContext,
}

pub fn router(context: ChatContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/questions", get(questions_handler))
        .route("/api/answer", post(answer_handler))
        .route("/api/conversations/{id}", get(conversation_handler))
        .layer(cors)
        .with_state(AppState { context })
}

pub async fn start_http_server(
    http_port: u16,
    context: ChatContext
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(context);
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    error!("HTTP server error: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            }
        }
    });

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn questions_handler() -> Json<QuestionsResponse> {
    Json(QuestionsResponse {
        questions: ALLOWED_QUESTIONS.iter()
            .map(|entry| entry.question.to_string())
            .collect(),
    })
}

async fn answer_handler(Json(req): Json<AnswerRequest>) -> Json<AnswerResponse> {
    let answer = matcher::answer(&req.question);
    Json(AnswerResponse {
        matched: answer.is_some(),
        answer: answer.map(str::to_string).unwrap_or_else(matcher::fallback_message),
    })
}

/// Conversation lookup. Unknown ids get the greeting a new widget would show,
/// without storing it.
async fn conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ConversationQuery>
) -> impl IntoResponse {
    if !is_valid_session_id(&id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                message: format!("Invalid conversation id '{}'", id),
            }),
        ).into_response();
    }

    let path = query.path.unwrap_or_else(|| "/".to_string());
    let key = state.context.conversation_key(&id);
    let store = ConversationStore::peek(state.context.storage.clone(), &key, &path).await;

    (
        StatusCode::OK,
        Json(ConversationResponse {
            id,
            messages: store.all().to_vec(),
        }),
    ).into_response()
}
