use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const KIND_CHAT_ASSIGNED: &str = "CHAT_ASSIGNED";
pub const KIND_CHAT_TRANSFERRED: &str = "CHAT_TRANSFERRED";
pub const KIND_CUSTOMER_WAITING: &str = "CUSTOMER_WAITING";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatNotification {
    pub id: i32,
    pub user_id: i32,
    pub chat_id: Option<i32>,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub is_read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub limit: Option<i64>,
    pub unread_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MarkNotificationsRequest {
    pub notification_ids: Option<Vec<i32>>,
}
