// Typing indicator coordination. Rows are the source of truth; a transient
// broadcast on the session channel gives subscribers lower latency. Absence
// of a row is the canonical "not typing" state.

use crate::models::typing::{TypingIndicator, TYPING_TTL_SECONDS};
use crate::realtime::{session_channel, RealtimeHub};
use serde_json::json;
use sqlx::PgPool;

pub struct TypingService;

impl TypingService {
    /// Refreshes (or creates) the indicator row when typing, deletes it
    /// outright when not. Either way a transient event goes out on the
    /// session channel; broadcast failure is not an error.
    pub async fn set_typing(
        pool: &PgPool,
        hub: &RealtimeHub,
        session_id: i32,
        actor: &str,
        is_typing: bool,
    ) -> Result<(), sqlx::Error> {
        if is_typing {
            sqlx::query(
                r#"
                INSERT INTO typing_indicators (session_id, actor, is_typing, last_typing_at, expires_at)
                VALUES ($1, $2, true, NOW(), NOW() + make_interval(secs => $3))
                ON CONFLICT (session_id, actor) DO UPDATE SET
                    is_typing = true,
                    last_typing_at = NOW(),
                    expires_at = NOW() + make_interval(secs => $3)
                "#,
            )
            .bind(session_id)
            .bind(actor)
            .bind(TYPING_TTL_SECONDS as f64)
            .execute(pool)
            .await?;
        } else {
            sqlx::query("DELETE FROM typing_indicators WHERE session_id = $1 AND actor = $2")
                .bind(session_id)
                .bind(actor)
                .execute(pool)
                .await?;
        }

        hub.broadcast(
            &session_channel(session_id),
            "typing",
            json!({
                "session_id": session_id,
                "actor": actor,
                "is_typing": is_typing,
            }),
        )
        .await;

        Ok(())
    }

    /// Live indicators for a session, excluding the caller's own actor so a
    /// party never sees itself typing. Expiry is checked at query time; the
    /// sweep is only a cleanup optimization.
    pub async fn active_for(
        pool: &PgPool,
        session_id: i32,
        exclude_actor: &str,
    ) -> Result<Vec<TypingIndicator>, sqlx::Error> {
        sqlx::query_as::<_, TypingIndicator>(
            r#"
            SELECT * FROM typing_indicators
            WHERE session_id = $1
              AND actor <> $2
              AND expires_at > NOW()
            "#,
        )
        .bind(session_id)
        .bind(exclude_actor)
        .fetch_all(pool)
        .await
    }

    /// Deletes rows past expiry. Returns how many were removed.
    pub async fn sweep_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM typing_indicators WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
