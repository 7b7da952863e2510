use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::csrf::CSRF_HEADER;

/// Session bootstrap payload. Tells the client which header must echo the
/// CSRF cookie on state-changing calls.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub status: &'static str,
    pub csrf_header: &'static str,
}

impl SessionInfo {
    pub fn current() -> Self {
        Self { status: "ok", csrf_header: CSRF_HEADER }
    }
}

/// Incoming chat message. By the time a handler sees this, the body has
/// passed the sanitizer and carries no markup.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageRequest {
    pub conversation_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

/// Message listing for one conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationMessages {
    pub conversation_id: Uuid,
    pub messages: Vec<ChatMessageResponse>,
    pub search: Option<String>,
}
