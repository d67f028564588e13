// Chat state machine and agent assignment. OPEN -> IN_PROGRESS -> RESOLVED,
// with WAITING as a side branch while the agent awaits the customer. A chat
// with no assigned agent is answered by the AI.

use crate::models::chat::{
    Chat, PRIORITY_MEDIUM, SOURCE_WIDGET, STATUS_IN_PROGRESS, STATUS_OPEN, STATUS_RESOLVED,
    STATUS_WAITING,
};
use crate::models::message::{MESSAGE_TYPE_SYSTEM, SENDER_SYSTEM};
use crate::models::notification::{KIND_CHAT_ASSIGNED, KIND_CHAT_TRANSFERRED};
use crate::services::NotificationService;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat not found")]
    NotFound,
    #[error("chat is already assigned to an agent")]
    AlreadyAssigned,
    #[error("chat is not assigned to the expected agent")]
    AssigneeMismatch,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

pub struct ChatService;

impl ChatService {
    /// Returns the most recent open chat in the session, creating one with
    /// defaults (OPEN, MEDIUM, WIDGET) when none exists.
    pub async fn get_or_create_chat(
        pool: &PgPool,
        session_id: i32,
        customer_id: i32,
    ) -> Result<Chat, sqlx::Error> {
        let existing = sqlx::query_as::<_, Chat>(
            r#"
            SELECT * FROM chats
            WHERE session_id = $1
              AND status IN ($2, $3, $4)
              AND is_deleted = false
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .bind(STATUS_OPEN)
        .bind(STATUS_IN_PROGRESS)
        .bind(STATUS_WAITING)
        .fetch_optional(pool)
        .await?;

        if let Some(chat) = existing {
            return Ok(chat);
        }

        let chat = sqlx::query_as::<_, Chat>(
            r#"
            INSERT INTO chats (session_id, customer_id, status, priority, source)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(customer_id)
        .bind(STATUS_OPEN)
        .bind(PRIORITY_MEDIUM)
        .bind(SOURCE_WIDGET)
        .fetch_one(pool)
        .await?;

        tracing::info!("Created chat {} for session {}", chat.id, session_id);
        Ok(chat)
    }

    pub async fn find_by_id(pool: &PgPool, chat_id: i32) -> Result<Option<Chat>, sqlx::Error> {
        sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = $1 AND is_deleted = false")
            .bind(chat_id)
            .fetch_optional(pool)
            .await
    }

    /// Assigns an unassigned chat to an agent. The update is conditional on
    /// the chat being unassigned, so two agents racing for the same chat
    /// resolve to exactly one winner; the loser gets `AlreadyAssigned`.
    pub async fn assign_chat(
        pool: &PgPool,
        chat_id: i32,
        agent_id: i32,
    ) -> Result<Chat, ChatError> {
        let chat = sqlx::query_as::<_, Chat>(
            r#"
            UPDATE chats
            SET assigned_agent_id = $2, status = $3, updated_at = NOW()
            WHERE id = $1
              AND assigned_agent_id IS NULL
              AND is_deleted = false
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(agent_id)
        .bind(STATUS_IN_PROGRESS)
        .fetch_optional(pool)
        .await?;

        let Some(chat) = chat else {
            // Distinguish a missing chat from a lost race.
            return match Self::find_by_id(pool, chat_id).await? {
                Some(_) => Err(ChatError::AlreadyAssigned),
                None => Err(ChatError::NotFound),
            };
        };

        // Notification and system message are best-effort; the assignment
        // itself already committed.
        if let Err(e) = NotificationService::create(
            pool,
            agent_id,
            Some(chat.id),
            KIND_CHAT_ASSIGNED,
            "Chat assigned to you",
            &format!("You have been assigned chat #{}", chat.id),
            Some(&format!("/agent/chats/{}", chat.id)),
        )
        .await
        {
            tracing::warn!("Failed to create assignment notification for chat {}: {}", chat.id, e);
        }

        if let Err(e) = Self::append_system_message(
            pool,
            &chat,
            "An agent has joined the conversation.",
        )
        .await
        {
            tracing::warn!("Failed to append assignment system message for chat {}: {}", chat.id, e);
        }

        tracing::info!("Assigned chat {} to agent {}", chat.id, agent_id);
        Ok(chat)
    }

    /// Transfers a chat between agents. Conditional on the current assignee
    /// still being `from_agent_id`; a stale transfer affects zero rows and
    /// surfaces as `AssigneeMismatch`, never as silent success.
    pub async fn transfer_chat(
        pool: &PgPool,
        chat_id: i32,
        from_agent_id: i32,
        to_agent_id: i32,
        reason: Option<&str>,
    ) -> Result<Chat, ChatError> {
        let chat = sqlx::query_as::<_, Chat>(
            r#"
            UPDATE chats
            SET assigned_agent_id = $3, status = $4, updated_at = NOW()
            WHERE id = $1
              AND assigned_agent_id = $2
              AND is_deleted = false
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(from_agent_id)
        .bind(to_agent_id)
        .bind(STATUS_IN_PROGRESS)
        .fetch_optional(pool)
        .await?;

        let Some(chat) = chat else {
            return match Self::find_by_id(pool, chat_id).await? {
                Some(_) => Err(ChatError::AssigneeMismatch),
                None => Err(ChatError::NotFound),
            };
        };

        let reason_text = reason.unwrap_or("no reason given");
        for (user_id, title, body) in [
            (
                from_agent_id,
                "Chat transferred away",
                format!("Chat #{} was transferred to another agent ({})", chat.id, reason_text),
            ),
            (
                to_agent_id,
                "Chat transferred to you",
                format!("Chat #{} was transferred to you ({})", chat.id, reason_text),
            ),
        ] {
            if let Err(e) = NotificationService::create(
                pool,
                user_id,
                Some(chat.id),
                KIND_CHAT_TRANSFERRED,
                title,
                &body,
                Some(&format!("/agent/chats/{}", chat.id)),
            )
            .await
            {
                tracing::warn!("Failed to create transfer notification for chat {}: {}", chat.id, e);
            }
        }

        if let Err(e) = Self::append_system_message(
            pool,
            &chat,
            "The conversation was transferred to another agent.",
        )
        .await
        {
            tracing::warn!("Failed to append transfer system message for chat {}: {}", chat.id, e);
        }

        tracing::info!(
            "Transferred chat {} from agent {} to agent {}",
            chat.id,
            from_agent_id,
            to_agent_id
        );
        Ok(chat)
    }

    pub async fn resolve_chat(pool: &PgPool, chat_id: i32) -> Result<Chat, ChatError> {
        sqlx::query_as::<_, Chat>(
            "UPDATE chats SET status = $2, updated_at = NOW() WHERE id = $1 AND is_deleted = false RETURNING *",
        )
        .bind(chat_id)
        .bind(STATUS_RESOLVED)
        .fetch_optional(pool)
        .await?
        .ok_or(ChatError::NotFound)
    }

    /// Marks an in-progress chat as waiting on the customer.
    pub async fn set_waiting(pool: &PgPool, chat_id: i32) -> Result<Chat, ChatError> {
        sqlx::query_as::<_, Chat>(
            r#"
            UPDATE chats SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3 AND is_deleted = false
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(STATUS_WAITING)
        .bind(STATUS_IN_PROGRESS)
        .fetch_optional(pool)
        .await?
        .ok_or(ChatError::NotFound)
    }

    /// Unassigned queue, highest priority first, oldest first within a
    /// priority band so nobody waits forever.
    pub async fn list_unassigned(pool: &PgPool) -> Result<Vec<Chat>, sqlx::Error> {
        sqlx::query_as::<_, Chat>(
            r#"
            SELECT * FROM chats
            WHERE assigned_agent_id IS NULL
              AND status IN ($1, $2)
              AND is_deleted = false
            ORDER BY
                CASE priority
                    WHEN 'URGENT' THEN 4
                    WHEN 'HIGH' THEN 3
                    WHEN 'MEDIUM' THEN 2
                    ELSE 1
                END DESC,
                created_at ASC
            "#,
        )
        .bind(STATUS_OPEN)
        .bind(STATUS_WAITING)
        .fetch_all(pool)
        .await
    }

    pub async fn list_for_agent(
        pool: &PgPool,
        agent_id: i32,
        status: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Chat>, sqlx::Error> {
        sqlx::query_as::<_, Chat>(
            r#"
            SELECT * FROM chats
            WHERE assigned_agent_id = $1
              AND is_deleted = false
              AND ($2::text IS NULL OR status = $2)
            ORDER BY last_message_at DESC NULLS LAST
            LIMIT $3
            "#,
        )
        .bind(agent_id)
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    async fn append_system_message(
        pool: &PgPool,
        chat: &Chat,
        content: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO messages (chat_id, session_id, sender_type, content, message_type, is_read)
            VALUES ($1, $2, $3, $4, $5, true)
            "#,
        )
        .bind(chat.id)
        .bind(chat.session_id)
        .bind(SENDER_SYSTEM)
        .bind(content)
        .bind(MESSAGE_TYPE_SYSTEM)
        .execute(pool)
        .await?;
        Ok(())
    }
}
