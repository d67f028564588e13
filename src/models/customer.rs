use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub is_online: bool,
    pub last_seen_at: chrono::DateTime<chrono::Utc>,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
