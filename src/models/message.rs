use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const SENDER_CUSTOMER: &str = "CUSTOMER";
pub const SENDER_AGENT: &str = "AGENT";
pub const SENDER_AI: &str = "AI";
pub const SENDER_SYSTEM: &str = "SYSTEM";

pub const MESSAGE_TYPE_TEXT: &str = "TEXT";
pub const MESSAGE_TYPE_SYSTEM: &str = "SYSTEM";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i32,
    pub chat_id: i32,
    pub session_id: i32,
    pub sender_type: String,
    pub sender_id: Option<i32>,
    pub content: String,
    pub message_type: String,
    pub ai_model: Option<String>,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub is_read: bool,
    pub delivered_at: chrono::DateTime<chrono::Utc>,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// AI authorship metadata attached to generated replies.
#[derive(Debug, Clone, Default)]
pub struct AiMetadata {
    pub model: Option<String>,
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(rename = "sessionToken")]
    pub session_token: String,
    pub message: String,
    #[serde(rename = "messageType")]
    pub message_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    #[serde(rename = "sessionToken")]
    pub session_token: String,
    #[serde(rename = "messageIds")]
    pub message_ids: Option<Vec<i32>>,
}

#[derive(Debug, Deserialize)]
pub struct MessageHistoryQuery {
    #[serde(rename = "sessionToken")]
    pub session_token: String,
    pub limit: Option<i64>,
}
