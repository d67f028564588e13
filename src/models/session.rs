use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Inactivity window after which a session is treated as expired by any
/// reader, regardless of the stored `is_active` flag.
pub const SESSION_TIMEOUT_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConversationSession {
    pub id: i32,
    pub session_token: String,
    pub customer_id: i32,
    pub is_active: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub total_messages: i32,
    pub ai_messages: i32,
    pub human_messages: i32,
    pub satisfaction: Option<i32>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ConversationSession {
    /// Lazy-expiry check: the stored flag alone is not authoritative, a
    /// session is live only while its last activity is inside the window.
    pub fn is_live(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.is_active
            && now.signed_duration_since(self.last_activity_at)
                < chrono::Duration::minutes(SESSION_TIMEOUT_MINUTES)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    #[serde(rename = "sessionToken")]
    pub session_token: String,
    pub action: Option<String>,
    #[serde(rename = "customerSatisfaction")]
    pub customer_satisfaction: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub session: ConversationSession,
    pub customer: super::customer::Customer,
    pub is_new_session: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn session(last_activity: chrono::DateTime<chrono::Utc>, is_active: bool) -> ConversationSession {
        ConversationSession {
            id: 1,
            session_token: "tok".to_string(),
            customer_id: 1,
            is_active,
            started_at: last_activity,
            last_activity_at: last_activity,
            ended_at: None,
            total_messages: 0,
            ai_messages: 0,
            human_messages: 0,
            satisfaction: None,
            created_at: last_activity,
        }
    }

    #[test]
    fn recent_activity_is_live() {
        let now = Utc::now();
        assert!(session(now - Duration::minutes(5), true).is_live(now));
    }

    #[test]
    fn stale_active_flag_is_not_trusted() {
        let now = Utc::now();
        // is_active still true in storage, but the window has passed
        assert!(!session(now - Duration::minutes(31), true).is_live(now));
    }

    #[test]
    fn ended_session_is_not_live() {
        let now = Utc::now();
        assert!(!session(now - Duration::minutes(1), false).is_live(now));
    }

    #[test]
    fn boundary_is_exclusive() {
        let now = Utc::now();
        assert!(!session(now - Duration::minutes(SESSION_TIMEOUT_MINUTES), true).is_live(now));
    }
}
