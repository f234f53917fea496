//! API routes
//!
//! The JSON surface a chat UI talks to: one turn of chat, transcript
//! readback for rendering history, session housekeeping, and model listing
//! for the model-selection widget.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::Message;
use crate::core::{ChatError, ChatRequest, ChatResponse, SessionSummary};
use crate::providers::Provider;
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
struct ModelsQuery {
    #[serde(default = "default_provider")]
    provider: String,
}

fn default_provider() -> String {
    "ollama".into()
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    provider: String,
    models: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SessionMessages {
    session_id: Uuid,
    messages: Vec<Message>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let response = state.chat_engine.chat(request).await.map_err(|e| {
        let status = match e {
            ChatError::UnknownSession(_) => StatusCode::NOT_FOUND,
            ChatError::Provider(_) => StatusCode::BAD_REQUEST,
        };
        (status, e.to_string())
    })?;

    Ok(Json(response))
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.chat_engine.sessions().list().await)
}

async fn session_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionMessages>, (StatusCode, String)> {
    let messages = state
        .chat_engine
        .sessions()
        .messages(id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown session: {}", id)))?;

    Ok(Json(SessionMessages {
        session_id: id,
        messages,
    }))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.chat_engine.sessions().remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Unknown session: {}", id)))
    }
}

async fn list_personas(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.chat_engine.list_personas().await)
}

async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> Result<Json<ModelsResponse>, (StatusCode, String)> {
    let provider = Provider::from_name(&query.provider, state.chat_engine.config())
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let models = provider
        .list_models()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    Ok(Json(ModelsResponse {
        provider: query.provider,
        models,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(chat))
        .route("/v1/sessions", get(list_sessions))
        .route("/v1/sessions/:id/messages", get(session_messages))
        .route("/v1/sessions/:id", delete(delete_session))
        .route("/v1/models", get(list_models))
        .route("/v1/personas", get(list_personas))
}
