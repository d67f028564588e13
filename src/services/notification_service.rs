// Per-agent notification inbox. Creation is best-effort at every call site:
// a failed notification never fails the operation that triggered it.

use crate::models::notification::ChatNotification;
use sqlx::PgPool;

pub struct NotificationService;

impl NotificationService {
    pub async fn create(
        pool: &PgPool,
        user_id: i32,
        chat_id: Option<i32>,
        kind: &str,
        title: &str,
        body: &str,
        url: Option<&str>,
    ) -> Result<ChatNotification, sqlx::Error> {
        sqlx::query_as::<_, ChatNotification>(
            r#"
            INSERT INTO chat_notifications (user_id, chat_id, kind, title, body, url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(chat_id)
        .bind(kind)
        .bind(title)
        .bind(body)
        .bind(url)
        .fetch_one(pool)
        .await
    }

    /// Agent inbox, unread first, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: i32,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<ChatNotification>, sqlx::Error> {
        sqlx::query_as::<_, ChatNotification>(
            r#"
            SELECT * FROM chat_notifications
            WHERE user_id = $1
              AND (NOT $2 OR is_read = false)
            ORDER BY is_read ASC, created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn unread_count(pool: &PgPool, user_id: i32) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM chat_notifications WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Marks the given notifications read; all of the agent's unread ones
    /// when no ids are given.
    pub async fn mark_read(
        pool: &PgPool,
        user_id: i32,
        notification_ids: Option<&[i32]>,
    ) -> Result<u64, sqlx::Error> {
        let result = match notification_ids {
            Some(ids) => {
                sqlx::query(
                    r#"
                    UPDATE chat_notifications SET is_read = true
                    WHERE user_id = $1 AND is_read = false AND id = ANY($2)
                    "#,
                )
                .bind(user_id)
                .bind(ids)
                .execute(pool)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE chat_notifications SET is_read = true WHERE user_id = $1 AND is_read = false",
                )
                .bind(user_id)
                .execute(pool)
                .await?
            }
        };
        Ok(result.rows_affected())
    }
}
