//! Chat API handlers.
//!
//! Thin by design: the interesting work happened in the middleware chain by
//! the time a request lands here. Bodies, query strings and path parameters
//! arrive sanitized; rejected requests never arrive at all. Forwarding to the
//! language-model gateway is an external collaborator and is not part of this
//! service.

use axum::{
    extract::{Path, Query},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::types::{ChatMessageRequest, ChatMessageResponse, ConversationMessages, SessionInfo};

/// Session bootstrap. Any GET response triggers CSRF cookie issuance in the
/// middleware when the client has none yet; this endpoint exists so clients
/// have a cheap call to make for that purpose.
pub async fn session() -> Json<SessionInfo> {
    Json(SessionInfo::current())
}

/// Accepts a chat message and echoes it back with server-assigned identity.
pub async fn post_message(
    Json(payload): Json<ChatMessageRequest>,
) -> AppResult<Json<ChatMessageResponse>> {
    if payload.message.trim().is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    let conversation_id = payload.conversation_id.unwrap_or_else(Uuid::new_v4);
    Ok(Json(ChatMessageResponse {
        id: Uuid::new_v4(),
        conversation_id,
        message: payload.message,
        received_at: Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub search: Option<String>,
    pub limit: Option<u32>,
}

/// Lists messages for one conversation. Message history lives client-side;
/// the server returns an empty listing plus the (sanitized) filter echo.
pub async fn list_messages(
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> AppResult<Json<ConversationMessages>> {
    let conversation_id = Uuid::parse_str(&id)
        .map_err(|_| AppError::BadRequest(format!("invalid conversation id: {}", id)))?;

    let limit = query.limit.unwrap_or(50).min(200) as usize;
    let messages = Vec::with_capacity(limit.min(16));
    Ok(Json(ConversationMessages { conversation_id, messages, search: query.search }))
}
