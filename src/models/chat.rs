use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const STATUS_OPEN: &str = "OPEN";
pub const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
pub const STATUS_WAITING: &str = "WAITING";
pub const STATUS_RESOLVED: &str = "RESOLVED";

pub const PRIORITY_MEDIUM: &str = "MEDIUM";
pub const SOURCE_WIDGET: &str = "WIDGET";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Chat {
    pub id: i32,
    pub session_id: i32,
    pub customer_id: i32,
    pub status: String,
    pub priority: String,
    pub source: String,
    pub assigned_agent_id: Option<i32>,
    pub message_count: i32,
    pub unread_count: i32,
    pub last_message_at: Option<chrono::DateTime<chrono::Utc>>,
    pub tags: Vec<String>,
    pub is_deleted: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Chat {
    /// A chat with no assigned agent is answered by the AI.
    pub fn is_ai_handled(&self) -> bool {
        self.assigned_agent_id.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatActionRequest {
    pub action: String,
    pub chat_id: i32,
    pub to_agent_id: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}
