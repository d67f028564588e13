// Agent dashboard endpoints, bearer-authenticated. The agent identity comes
// from the JWT claims injected by the auth middleware.

use crate::handlers::{api_error, internal_error, ApiError};
use crate::middleware::auth::auth_middleware;
use crate::models::auth::Claims;
use crate::models::chat::{ChatActionRequest, ChatListQuery};
use crate::models::message::{MESSAGE_TYPE_TEXT, SENDER_AGENT};
use crate::models::notification::{MarkNotificationsRequest, NotificationQuery};
use crate::services::chat_service::ChatError;
use crate::services::{ChatService, MessageService, NotificationService};
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub fn agent_routes() -> Router {
    Router::new()
        .route("/api/agent/chats", get(list_chats))
        .route("/api/agent/chats", post(chat_action))
        .route("/api/agent/chats/unassigned", get(list_unassigned))
        .route("/api/agent/chats/:id/messages", get(chat_messages))
        .route("/api/agent/chats/:id/messages", post(send_agent_message))
        .route("/api/agent/chats/:id/messages", put(mark_chat_read))
        .route("/api/agent/notifications", get(list_notifications))
        .route("/api/agent/notifications", put(mark_notifications))
        .layer(axum::middleware::from_fn(auth_middleware))
}

fn agent_id(claims: &Claims) -> Result<i32, ApiError> {
    claims
        .user_id()
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Invalid token subject"))
}

fn chat_error(err: ChatError) -> ApiError {
    match err {
        ChatError::NotFound => api_error(StatusCode::NOT_FOUND, "Chat not found"),
        ChatError::AlreadyAssigned => api_error(
            StatusCode::CONFLICT,
            "Chat is already assigned to an agent",
        ),
        ChatError::AssigneeMismatch => api_error(
            StatusCode::CONFLICT,
            "Chat is no longer assigned to the expected agent",
        ),
        ChatError::Db(e) => internal_error("Chat operation failed", e),
    }
}

async fn list_chats(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ChatListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent = agent_id(&claims)?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);

    let chats = ChatService::list_for_agent(&state.db_pool, agent, query.status.as_deref(), limit)
        .await
        .map_err(|e| internal_error("Failed to list chats", e))?;

    Ok(Json(json!({ "success": true, "chats": chats })))
}

async fn list_unassigned(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chats = ChatService::list_unassigned(&state.db_pool)
        .await
        .map_err(|e| internal_error("Failed to list unassigned chats", e))?;

    Ok(Json(json!({ "success": true, "chats": chats })))
}

async fn chat_action(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChatActionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent = agent_id(&claims)?;

    let chat = match payload.action.as_str() {
        "assign" => ChatService::assign_chat(&state.db_pool, payload.chat_id, agent)
            .await
            .map_err(chat_error)?,
        "transfer" => {
            let to_agent = payload.to_agent_id.ok_or_else(|| {
                api_error(StatusCode::BAD_REQUEST, "to_agent_id is required for transfer")
            })?;
            ChatService::transfer_chat(
                &state.db_pool,
                payload.chat_id,
                agent,
                to_agent,
                payload.reason.as_deref(),
            )
            .await
            .map_err(chat_error)?
        }
        "resolve" => ChatService::resolve_chat(&state.db_pool, payload.chat_id)
            .await
            .map_err(chat_error)?,
        "waiting" => ChatService::set_waiting(&state.db_pool, payload.chat_id)
            .await
            .map_err(chat_error)?,
        other => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                &format!("Unknown chat action: {}", other),
            ));
        }
    };

    Ok(Json(json!({ "success": true, "chat": chat })))
}

async fn chat_messages(
    Extension(state): Extension<Arc<AppState>>,
    Path(chat_id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chat = ChatService::find_by_id(&state.db_pool, chat_id)
        .await
        .map_err(|e| internal_error("Failed to load chat", e))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Chat not found"))?;

    let messages = MessageService::chat_messages(&state.db_pool, chat.id, 200)
        .await
        .map_err(|e| internal_error("Failed to load chat messages", e))?;

    Ok(Json(json!({ "success": true, "chat": chat, "messages": messages })))
}

#[derive(Debug, Deserialize)]
struct AgentMessageRequest {
    message: String,
}

async fn send_agent_message(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<i32>,
    Json(payload): Json<AgentMessageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent = agent_id(&claims)?;
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Message is required"));
    }

    let chat = ChatService::find_by_id(&state.db_pool, chat_id)
        .await
        .map_err(|e| internal_error("Failed to load chat", e))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Chat not found"))?;

    // Agent replies never trigger the AI generator.
    let message = MessageService::save_message(
        &state.db_pool,
        chat.id,
        chat.session_id,
        payload.message.trim(),
        SENDER_AGENT,
        Some(agent),
        MESSAGE_TYPE_TEXT,
        None,
    )
    .await
    .map_err(|e| internal_error("Failed to save message", e))?;
    MessageService::publish_message(&state.hub, &message).await;

    Ok(Json(json!({ "success": true, "message": message })))
}

#[derive(Debug, Deserialize)]
struct AgentMarkReadRequest {
    #[serde(rename = "messageIds")]
    message_ids: Option<Vec<i32>>,
}

async fn mark_chat_read(
    Extension(state): Extension<Arc<AppState>>,
    Path(chat_id): Path<i32>,
    Json(payload): Json<AgentMarkReadRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = MessageService::mark_read(
        &state.db_pool,
        chat_id,
        payload.message_ids.as_deref(),
    )
    .await
    .map_err(|e| internal_error("Failed to mark messages as read", e))?;

    Ok(Json(json!({ "success": true, "updated": updated })))
}

async fn list_notifications(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent = agent_id(&claims)?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let unread_only = query.unread_only.unwrap_or(false);

    let notifications =
        NotificationService::list_for_user(&state.db_pool, agent, unread_only, limit)
            .await
            .map_err(|e| internal_error("Failed to list notifications", e))?;
    let unread = NotificationService::unread_count(&state.db_pool, agent)
        .await
        .map_err(|e| internal_error("Failed to count notifications", e))?;

    Ok(Json(json!({
        "success": true,
        "notifications": notifications,
        "unread_count": unread,
    })))
}

async fn mark_notifications(
    Extension(state): Extension<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<MarkNotificationsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent = agent_id(&claims)?;

    let updated = NotificationService::mark_read(
        &state.db_pool,
        agent,
        payload.notification_ids.as_deref(),
    )
    .await
    .map_err(|e| internal_error("Failed to mark notifications as read", e))?;

    Ok(Json(json!({ "success": true, "updated": updated })))
}
