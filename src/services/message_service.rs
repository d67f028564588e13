// Message pipeline: persists messages together with the denormalized chat
// and session counters, generates AI replies for customer messages, and
// publishes change events on the realtime hub.

use crate::ai_client::{AiError, ChatTurn, Completion, CompletionBackend, AI_FALLBACK_REPLY};
use crate::models::customer::Customer;
use crate::models::message::{
    AiMetadata, Message, MESSAGE_TYPE_TEXT, SENDER_AI, SENDER_CUSTOMER,
};
use crate::realtime::{ChangeKind, RealtimeHub};
use crate::services::KnowledgeBaseService;
use sqlx::PgPool;
use std::time::Duration;

/// Caller-imposed timeout on the completion call; expiry degrades to the
/// apology fallback like any other generator failure.
pub const AI_TIMEOUT: Duration = Duration::from_secs(30);

/// Conversation turns handed to the generator, newest last.
pub const AI_CONTEXT_MESSAGES: i64 = 20;

pub struct MessageService;

impl MessageService {
    /// Persists one message and updates the chat- and session-level counters
    /// in the same transaction, so a crash cannot leave the counters behind
    /// the message log.
    pub async fn save_message(
        pool: &PgPool,
        chat_id: i32,
        session_id: i32,
        content: &str,
        sender_type: &str,
        sender_id: Option<i32>,
        message_type: &str,
        ai_meta: Option<&AiMetadata>,
    ) -> Result<Message, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Customer messages start unread; everything else starts read.
        let is_read = sender_type != SENDER_CUSTOMER;
        let meta = ai_meta.cloned().unwrap_or_default();

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages
                (chat_id, session_id, sender_type, sender_id, content, message_type,
                 ai_model, prompt_tokens, completion_tokens, is_read)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(session_id)
        .bind(sender_type)
        .bind(sender_id)
        .bind(content)
        .bind(message_type)
        .bind(meta.model.as_deref())
        .bind(meta.prompt_tokens)
        .bind(meta.completion_tokens)
        .bind(is_read)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE chats
            SET message_count = message_count + 1,
                unread_count = unread_count + CASE WHEN $2 THEN 0 ELSE 1 END,
                last_message_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(chat_id)
        .bind(is_read)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE conversation_sessions
            SET total_messages = total_messages + 1,
                ai_messages = ai_messages + CASE WHEN $2 = 'AI' THEN 1 ELSE 0 END,
                human_messages = human_messages + CASE WHEN $2 IN ('CUSTOMER', 'AGENT') THEN 1 ELSE 0 END,
                last_activity_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .bind(sender_type)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Publishes a change event for a persisted message. Broadcast failures
    /// never fail the send path; subscribers that missed it catch up by
    /// polling the history endpoint.
    pub async fn publish_message(hub: &RealtimeHub, message: &Message) {
        let payload = match serde_json::to_value(message) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Failed to serialize message {} for broadcast: {}", message.id, e);
                return;
            }
        };
        hub.publish_change(
            "messages",
            ChangeKind::Insert,
            "session_id",
            &message.session_id.to_string(),
            payload,
        )
        .await;
    }

    /// Full customer-message pipeline: persists the customer's message, then
    /// generates and persists the AI reply. Exactly two messages come out of
    /// this even when the generator fails; the reply is then the canned
    /// apology rather than a lost turn.
    pub async fn save_customer_message_with_ai_reply(
        pool: &PgPool,
        hub: &RealtimeHub,
        backend: Option<&dyn CompletionBackend>,
        chat_id: i32,
        session_id: i32,
        customer: &Customer,
        content: &str,
        message_type: &str,
    ) -> Result<(Message, Message), sqlx::Error> {
        let customer_message = Self::save_message(
            pool,
            chat_id,
            session_id,
            content,
            SENDER_CUSTOMER,
            None,
            message_type,
            None,
        )
        .await?;
        Self::publish_message(hub, &customer_message).await;

        let turns = Self::build_ai_context(pool, session_id, customer, content).await;
        let (reply, meta) = generate_reply(backend, &turns).await;

        let ai_message = Self::save_message(
            pool,
            chat_id,
            session_id,
            &reply,
            SENDER_AI,
            None,
            MESSAGE_TYPE_TEXT,
            Some(&meta),
        )
        .await?;
        Self::publish_message(hub, &ai_message).await;

        Ok((customer_message, ai_message))
    }

    /// Assembles generator input: a system prompt with knowledge-base
    /// snippets and a short customer profile, followed by the last N session
    /// messages in chronological order.
    async fn build_ai_context(
        pool: &PgPool,
        session_id: i32,
        customer: &Customer,
        query: &str,
    ) -> Vec<ChatTurn> {
        // KB lookup is best-effort context, not a hard dependency.
        let articles = match KnowledgeBaseService::search(pool, query, 5).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::warn!("Knowledge base search failed: {}", e);
                Vec::new()
            }
        };

        let chat_count: i64 = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM chats WHERE customer_id = $1 AND is_deleted = false",
        )
        .bind(customer.id)
        .fetch_one(pool)
        .await
        .map(|r| r.0)
        .unwrap_or(0);

        let history = Self::history(pool, session_id, AI_CONTEXT_MESSAGES)
            .await
            .unwrap_or_default();

        build_turns(customer, chat_count, &articles, &history)
    }

    /// Marks unread customer messages as read. With ids given only those
    /// rows are touched; without, every unread message in the chat. Returns
    /// how many rows changed; the chat unread counter is recomputed from the
    /// surviving unread rows rather than decremented blindly.
    pub async fn mark_read(
        pool: &PgPool,
        chat_id: i32,
        message_ids: Option<&[i32]>,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let updated = match message_ids {
            Some(ids) => {
                sqlx::query(
                    r#"
                    UPDATE messages
                    SET is_read = true, read_at = NOW()
                    WHERE chat_id = $1
                      AND sender_type = $2
                      AND is_read = false
                      AND id = ANY($3)
                    "#,
                )
                .bind(chat_id)
                .bind(SENDER_CUSTOMER)
                .bind(ids)
                .execute(&mut *tx)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE messages
                    SET is_read = true, read_at = NOW()
                    WHERE chat_id = $1
                      AND sender_type = $2
                      AND is_read = false
                    "#,
                )
                .bind(chat_id)
                .bind(SENDER_CUSTOMER)
                .execute(&mut *tx)
                .await?
            }
        };

        sqlx::query(
            r#"
            UPDATE chats
            SET unread_count = (
                    SELECT COUNT(*) FROM messages
                    WHERE chat_id = $1 AND sender_type = $2 AND is_read = false
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(chat_id)
        .bind(SENDER_CUSTOMER)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated.rows_affected())
    }

    /// Session history in chronological order.
    pub async fn history(
        pool: &PgPool,
        session_id: i32,
        limit: i64,
    ) -> Result<Vec<Message>, sqlx::Error> {
        let mut messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE session_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn chat_messages(
        pool: &PgPool,
        chat_id: i32,
        limit: i64,
    ) -> Result<Vec<Message>, sqlx::Error> {
        let mut messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE chat_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(chat_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        messages.reverse();
        Ok(messages)
    }
}

/// Calls the generator with a timeout and degrades to the apology fallback
/// on any failure, including a missing backend.
pub async fn generate_reply(
    backend: Option<&dyn CompletionBackend>,
    turns: &[ChatTurn],
) -> (String, AiMetadata) {
    let Some(backend) = backend else {
        tracing::warn!("No completion backend configured, using fallback reply");
        return (AI_FALLBACK_REPLY.to_string(), AiMetadata::default());
    };

    let result: Result<Result<Completion, AiError>, _> =
        tokio::time::timeout(AI_TIMEOUT, backend.complete(turns)).await;

    match result {
        Ok(Ok(completion)) => {
            let meta = AiMetadata {
                model: Some(completion.model),
                prompt_tokens: completion.prompt_tokens,
                completion_tokens: completion.completion_tokens,
            };
            (completion.content, meta)
        }
        Ok(Err(e)) => {
            tracing::error!("AI completion failed: {}", e);
            (AI_FALLBACK_REPLY.to_string(), AiMetadata::default())
        }
        Err(_) => {
            tracing::error!("AI completion timed out after {:?}", AI_TIMEOUT);
            (AI_FALLBACK_REPLY.to_string(), AiMetadata::default())
        }
    }
}

/// Pure assembly of the generator conversation from already-fetched parts.
pub fn build_turns(
    customer: &Customer,
    chat_count: i64,
    articles: &[crate::services::knowledge_base::KbArticle],
    history: &[Message],
) -> Vec<ChatTurn> {
    let mut system = String::from(
        "You are a helpful customer support assistant. Answer concisely and \
         politely. If you do not know the answer, say a human agent will follow up.",
    );

    if let Some(name) = customer.name.as_deref() {
        system.push_str(&format!("\n\nCustomer name: {}", name));
    }
    system.push_str(&format!("\nPrevious support chats: {}", chat_count));

    if !articles.is_empty() {
        system.push_str("\n\nRelevant knowledge base articles:");
        for article in articles {
            system.push_str(&format!("\n- {}: {}", article.title, article.content));
        }
    }

    let mut turns = vec![ChatTurn {
        role: "system".to_string(),
        content: system,
    }];

    for message in history {
        let role = match message.sender_type.as_str() {
            SENDER_CUSTOMER => "user",
            SENDER_AI => "assistant",
            // Agent and system lines are shown to the model as context on
            // the assistant side of the conversation.
            _ => "assistant",
        };
        turns.push(ChatTurn {
            role: role.to_string(),
            content: message.content.clone(),
        });
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::knowledge_base::KbArticle;
    use async_trait::async_trait;
    use chrono::Utc;

    struct CannedBackend {
        reply: Option<String>,
    }

    #[async_trait]
    impl CompletionBackend for CannedBackend {
        async fn complete(&self, _turns: &[ChatTurn]) -> Result<Completion, AiError> {
            match &self.reply {
                Some(content) => Ok(Completion {
                    content: content.clone(),
                    model: "test-model".to_string(),
                    prompt_tokens: Some(12),
                    completion_tokens: Some(7),
                }),
                None => Err(AiError::MissingChoice),
            }
        }
    }

    fn customer() -> Customer {
        Customer {
            id: 1,
            email: "a@b.com".to_string(),
            name: Some("Ada".to_string()),
            phone: None,
            is_online: true,
            last_seen_at: Utc::now(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn message(sender_type: &str, content: &str) -> Message {
        Message {
            id: 1,
            chat_id: 1,
            session_id: 1,
            sender_type: sender_type.to_string(),
            sender_id: None,
            content: content.to_string(),
            message_type: MESSAGE_TYPE_TEXT.to_string(),
            ai_model: None,
            prompt_tokens: None,
            completion_tokens: None,
            is_read: false,
            delivered_at: Utc::now(),
            read_at: None,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn generator_success_carries_token_usage() {
        let backend = CannedBackend {
            reply: Some("Sure, here is how.".to_string()),
        };
        let (reply, meta) = generate_reply(Some(&backend), &[]).await;
        assert_eq!(reply, "Sure, here is how.");
        assert_eq!(meta.model.as_deref(), Some("test-model"));
        assert_eq!(meta.prompt_tokens, Some(12));
        assert_eq!(meta.completion_tokens, Some(7));
    }

    #[tokio::test]
    async fn generator_failure_degrades_to_apology() {
        let backend = CannedBackend { reply: None };
        let (reply, meta) = generate_reply(Some(&backend), &[]).await;
        assert_eq!(reply, AI_FALLBACK_REPLY);
        assert!(meta.model.is_none());
    }

    #[tokio::test]
    async fn missing_backend_degrades_to_apology() {
        let (reply, _) = generate_reply(None, &[]).await;
        assert_eq!(reply, AI_FALLBACK_REPLY);
    }

    #[test]
    fn turns_start_with_system_prompt_and_follow_history_order() {
        let articles = vec![KbArticle {
            id: 1,
            title: "Refunds".to_string(),
            content: "Refunds take 5 days.".to_string(),
            keywords: vec!["refund".to_string()],
            is_published: true,
            created_at: Utc::now(),
        }];
        let history = vec![
            message(SENDER_CUSTOMER, "Hello"),
            message(SENDER_AI, "Hi, how can I help?"),
            message(SENDER_CUSTOMER, "Where is my refund?"),
        ];

        let turns = build_turns(&customer(), 3, &articles, &history);

        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].role, "system");
        assert!(turns[0].content.contains("Refunds take 5 days."));
        assert!(turns[0].content.contains("Ada"));
        assert_eq!(turns[1].role, "user");
        assert_eq!(turns[2].role, "assistant");
        assert_eq!(turns[3].content, "Where is my refund?");
    }
}
