// Widget session endpoints: create/resume, live-checked lookup, activity
// ping, and explicit end.

use crate::handlers::{api_error, internal_error, ApiError};
use crate::models::customer::Customer;
use crate::models::session::*;
use crate::services::SessionService;
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::Json,
    routing::{get, post, put, Router},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub fn session_routes() -> Router {
    Router::new()
        .route("/api/session", post(create_session))
        .route("/api/session", get(get_session))
        .route("/api/session", put(update_session))
}

#[derive(Debug, Deserialize)]
pub struct SessionTokenQuery {
    #[serde(rename = "sessionToken")]
    pub session_token: String,
}

async fn create_session(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let email = payload.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "A valid email address is required",
        ));
    }

    let handle = SessionService::get_or_create_session(
        &state.db_pool,
        email,
        payload.name.as_deref(),
        payload.phone.as_deref(),
        payload.metadata.as_ref(),
    )
    .await
    .map_err(|e| internal_error("Failed to create session", e))?;

    Ok(Json(SessionResponse {
        success: true,
        session: handle.session,
        customer: handle.customer,
        is_new_session: handle.is_new_session,
    }))
}

async fn get_session(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<SessionTokenQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = SessionService::find_by_token(&state.db_pool, &query.session_token)
        .await
        .map_err(|e| internal_error("Failed to look up session", e))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session not found"))?;

    // Live timeout check: report a stale session as inactive even when the
    // stored flag has not been swept yet.
    let is_live = session.is_live(chrono::Utc::now());

    let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
        .bind(session.customer_id)
        .fetch_one(&state.db_pool)
        .await
        .map_err(|e| internal_error("Failed to load customer", e))?;

    let mut session_json = serde_json::to_value(&session)
        .map_err(|e| internal_error("Failed to serialize session", e))?;
    session_json["is_active"] = json!(is_live);

    Ok(Json(json!({
        "success": true,
        "session": session_json,
        "customer": customer,
    })))
}

async fn update_session(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = SessionService::find_by_token(&state.db_pool, &payload.session_token)
        .await
        .map_err(|e| internal_error("Failed to look up session", e))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session not found"))?;

    match payload.action.as_deref() {
        Some("end") => {
            let ended = SessionService::end_session(
                &state.db_pool,
                session.id,
                payload.customer_satisfaction,
            )
            .await
            .map_err(|e| internal_error("Failed to end session", e))?;

            Ok(Json(json!({
                "success": true,
                "session": ended,
            })))
        }
        // Default action: activity ping from an open widget.
        _ => {
            SessionService::update_activity(&state.db_pool, session.id)
                .await
                .map_err(|e| internal_error("Failed to update session activity", e))?;

            Ok(Json(json!({ "success": true })))
        }
    }
}

/// Resolves a session token to a session that is still inside the activity
/// window. Shared by the message and typing endpoints.
pub async fn resolve_live_session(
    state: &AppState,
    token: &str,
) -> Result<ConversationSession, ApiError> {
    let session = SessionService::find_by_token(&state.db_pool, token)
        .await
        .map_err(|e| internal_error("Failed to look up session", e))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session not found"))?;

    if !session.is_live(chrono::Utc::now()) {
        return Err(api_error(StatusCode::NOT_FOUND, "Session has expired"));
    }

    Ok(session)
}
