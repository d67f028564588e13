// Conversation-session lifecycle: find-or-create by customer email, activity
// tracking, timeout expiry, and explicit termination.

use crate::models::customer::Customer;
use crate::models::session::{ConversationSession, SESSION_TIMEOUT_MINUTES};
use sqlx::PgPool;
use uuid::Uuid;

pub struct SessionService;

pub struct SessionHandle {
    pub session: ConversationSession,
    pub customer: Customer,
    pub is_new_session: bool,
}

impl SessionService {
    /// Finds or creates the customer by email, then reuses the newest active
    /// session still inside the inactivity window, creating a fresh one
    /// otherwise. The customer is marked online either way.
    pub async fn get_or_create_session(
        pool: &PgPool,
        email: &str,
        name: Option<&str>,
        phone: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> Result<SessionHandle, sqlx::Error> {
        let email = email.trim().to_lowercase();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (email, name, phone, is_online, last_seen_at, metadata)
            VALUES ($1, $2, $3, true, NOW(), COALESCE($4, '{}'::jsonb))
            ON CONFLICT (email) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, customers.name),
                phone = COALESCE(EXCLUDED.phone, customers.phone),
                is_online = true,
                last_seen_at = NOW(),
                metadata = customers.metadata || COALESCE($4, '{}'::jsonb),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&email)
        .bind(name)
        .bind(phone)
        .bind(metadata)
        .fetch_one(pool)
        .await?;

        // Reuse only sessions whose last activity is inside the window; the
        // stored is_active flag alone is not trusted (lazy expiry).
        let existing = sqlx::query_as::<_, ConversationSession>(
            r#"
            SELECT * FROM conversation_sessions
            WHERE customer_id = $1
              AND is_active = true
              AND last_activity_at > NOW() - make_interval(mins => $2)
            ORDER BY last_activity_at DESC
            LIMIT 1
            "#,
        )
        .bind(customer.id)
        .bind(SESSION_TIMEOUT_MINUTES as i32)
        .fetch_optional(pool)
        .await?;

        if let Some(session) = existing {
            tracing::debug!("Reusing active session {} for customer {}", session.id, customer.id);
            return Ok(SessionHandle {
                session,
                customer,
                is_new_session: false,
            });
        }

        let token = Uuid::new_v4().to_string();
        let session = sqlx::query_as::<_, ConversationSession>(
            r#"
            INSERT INTO conversation_sessions (session_token, customer_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(&token)
        .bind(customer.id)
        .fetch_one(pool)
        .await?;

        tracing::info!("Created session {} for customer {}", session.id, customer.id);
        Ok(SessionHandle {
            session,
            customer,
            is_new_session: true,
        })
    }

    pub async fn find_by_token(
        pool: &PgPool,
        token: &str,
    ) -> Result<Option<ConversationSession>, sqlx::Error> {
        sqlx::query_as::<_, ConversationSession>(
            "SELECT * FROM conversation_sessions WHERE session_token = $1",
        )
        .bind(token)
        .fetch_optional(pool)
        .await
    }

    /// Bumps the activity timestamp. Callers on the message path treat a
    /// failure here as non-fatal.
    pub async fn update_activity(pool: &PgPool, session_id: i32) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE conversation_sessions SET last_activity_at = NOW() WHERE id = $1",
        )
        .bind(session_id)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            UPDATE customers SET is_online = true, last_seen_at = NOW(), updated_at = NOW()
            WHERE id = (SELECT customer_id FROM conversation_sessions WHERE id = $1)
            "#,
        )
        .bind(session_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Marks the session inactive, records optional satisfaction, and takes
    /// the customer offline when no other active session remains.
    pub async fn end_session(
        pool: &PgPool,
        session_id: i32,
        satisfaction: Option<i32>,
    ) -> Result<Option<ConversationSession>, sqlx::Error> {
        let session = sqlx::query_as::<_, ConversationSession>(
            r#"
            UPDATE conversation_sessions
            SET is_active = false,
                ended_at = NOW(),
                satisfaction = COALESCE($2, satisfaction)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(satisfaction)
        .fetch_optional(pool)
        .await?;

        let Some(session) = session else {
            return Ok(None);
        };

        let remaining: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM conversation_sessions
            WHERE customer_id = $1
              AND is_active = true
              AND last_activity_at > NOW() - make_interval(mins => $2)
            "#,
        )
        .bind(session.customer_id)
        .bind(SESSION_TIMEOUT_MINUTES as i32)
        .fetch_one(pool)
        .await?;

        if remaining.0 == 0 {
            sqlx::query(
                "UPDATE customers SET is_online = false, updated_at = NOW() WHERE id = $1",
            )
            .bind(session.customer_id)
            .execute(pool)
            .await?;
        }

        tracing::info!("Ended session {} (satisfaction: {:?})", session_id, satisfaction);
        Ok(Some(session))
    }

    /// Maintenance sweep: flips sessions past the inactivity window to
    /// inactive. Readers do not depend on this running; the lazy check in
    /// `ConversationSession::is_live` is authoritative.
    pub async fn sweep_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE conversation_sessions
            SET is_active = false, ended_at = NOW()
            WHERE is_active = true
              AND last_activity_at <= NOW() - make_interval(mins => $1)
            "#,
        )
        .bind(SESSION_TIMEOUT_MINUTES as i32)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!("Swept {} expired sessions", result.rows_affected());
        }
        Ok(result.rows_affected())
    }

    /// Maintenance: takes customers offline when they have no live session.
    pub async fn refresh_customer_presence(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET is_online = false, updated_at = NOW()
            WHERE is_online = true
              AND NOT EXISTS (
                  SELECT 1 FROM conversation_sessions s
                  WHERE s.customer_id = customers.id
                    AND s.is_active = true
                    AND s.last_activity_at > NOW() - make_interval(mins => $1)
              )
            "#,
        )
        .bind(SESSION_TIMEOUT_MINUTES as i32)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
