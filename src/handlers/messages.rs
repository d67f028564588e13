// Widget message endpoints: send (with AI reply), history, mark-as-read.

use crate::ai_client::CompletionBackend;
use crate::handlers::session::resolve_live_session;
use crate::handlers::{api_error, internal_error, ApiError};
use crate::models::customer::Customer;
use crate::models::message::*;
use crate::models::notification::KIND_CUSTOMER_WAITING;
use crate::services::{ChatService, MessageService, NotificationService, SessionService};
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::Json,
    routing::{get, post, put, Router},
};
use serde_json::json;
use std::sync::Arc;

const DEFAULT_HISTORY_LIMIT: i64 = 50;

pub fn message_routes() -> Router {
    Router::new()
        .route("/api/messages", post(send_message))
        .route("/api/messages", get(message_history))
        .route("/api/messages", put(mark_read))
}

async fn send_message(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Message is required"));
    }

    let session = resolve_live_session(&state, &payload.session_token).await?;

    let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
        .bind(session.customer_id)
        .fetch_one(&state.db_pool)
        .await
        .map_err(|e| internal_error("Failed to load customer", e))?;

    let chat = ChatService::get_or_create_chat(&state.db_pool, session.id, customer.id)
        .await
        .map_err(|e| internal_error("Failed to open chat", e))?;

    // Activity bump is fire-and-forget; a failure must not block delivery.
    if let Err(e) = SessionService::update_activity(&state.db_pool, session.id).await {
        tracing::warn!("Failed to update activity for session {}: {}", session.id, e);
    }

    let message_type = payload.message_type.as_deref().unwrap_or(MESSAGE_TYPE_TEXT);

    // An assigned chat is handled by a human; the AI only answers while the
    // chat is unassigned.
    let (messages, chat) = if chat.is_ai_handled() {
        let backend = state
            .ai_client
            .as_ref()
            .map(|c| c as &dyn CompletionBackend);
        let (customer_msg, ai_msg) = MessageService::save_customer_message_with_ai_reply(
            &state.db_pool,
            &state.hub,
            backend,
            chat.id,
            session.id,
            &customer,
            payload.message.trim(),
            message_type,
        )
        .await
        .map_err(|e| internal_error("Failed to save message", e))?;
        (vec![customer_msg, ai_msg], chat)
    } else {
        let customer_msg = MessageService::save_message(
            &state.db_pool,
            chat.id,
            session.id,
            payload.message.trim(),
            SENDER_CUSTOMER,
            None,
            message_type,
            None,
        )
        .await
        .map_err(|e| internal_error("Failed to save message", e))?;
        MessageService::publish_message(&state.hub, &customer_msg).await;

        // Let the assigned agent know the customer is waiting on them.
        if let Some(agent_id) = chat.assigned_agent_id {
            if let Err(e) = NotificationService::create(
                &state.db_pool,
                agent_id,
                Some(chat.id),
                KIND_CUSTOMER_WAITING,
                "Customer replied",
                &format!("New message in chat #{}", chat.id),
                Some(&format!("/agent/chats/{}", chat.id)),
            )
            .await
            {
                tracing::warn!("Failed to create customer-waiting notification: {}", e);
            }
        }

        (vec![customer_msg], chat)
    };

    Ok(Json(json!({
        "success": true,
        "messages": messages,
        "chat": chat,
    })))
}

async fn message_history(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<MessageHistoryQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = resolve_live_session(&state, &query.session_token).await?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 200);

    let messages = MessageService::history(&state.db_pool, session.id, limit)
        .await
        .map_err(|e| internal_error("Failed to load message history", e))?;

    Ok(Json(json!({
        "success": true,
        "messages": messages,
    })))
}

async fn mark_read(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = resolve_live_session(&state, &payload.session_token).await?;

    let chat = ChatService::get_or_create_chat(&state.db_pool, session.id, session.customer_id)
        .await
        .map_err(|e| internal_error("Failed to open chat", e))?;

    let updated = MessageService::mark_read(
        &state.db_pool,
        chat.id,
        payload.message_ids.as_deref(),
    )
    .await
    .map_err(|e| internal_error("Failed to mark messages as read", e))?;

    Ok(Json(json!({
        "success": true,
        "updated": updated,
    })))
}
