use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WidgetSettings {
    pub id: i32,
    pub name: String,
    pub theme_color: String,
    pub welcome_message: String,
    pub offline_message: String,
    pub business_hours: serde_json::Value,
    pub require_email: bool,
    pub require_name: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SettingsQuery {
    pub name: Option<String>,
}
