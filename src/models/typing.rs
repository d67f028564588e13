use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Seconds an indicator stays valid without a refresh.
pub const TYPING_TTL_SECONDS: i64 = 10;

/// Actor label used for the customer side of a session. Agents are keyed by
/// their user id rendered as a string.
pub const ACTOR_CUSTOMER: &str = "customer";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TypingIndicator {
    pub id: i32,
    pub session_id: i32,
    pub actor: String,
    pub is_typing: bool,
    pub last_typing_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl TypingIndicator {
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Deserialize)]
pub struct SetTypingRequest {
    #[serde(rename = "sessionToken")]
    pub session_token: String,
    pub actor: Option<String>,
    #[serde(rename = "isTyping")]
    pub is_typing: bool,
}

#[derive(Debug, Deserialize)]
pub struct TypingQuery {
    #[serde(rename = "sessionToken")]
    pub session_token: String,
    pub actor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn expiry_is_inclusive_at_boundary() {
        let now = Utc::now();
        let row = TypingIndicator {
            id: 1,
            session_id: 1,
            actor: ACTOR_CUSTOMER.to_string(),
            is_typing: true,
            last_typing_at: now,
            expires_at: now,
        };
        assert!(row.is_expired(now));
        let fresh = TypingIndicator {
            expires_at: now + Duration::seconds(TYPING_TTL_SECONDS),
            ..row
        };
        assert!(!fresh.is_expired(now));
    }
}
