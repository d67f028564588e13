// Typing indicator endpoints, keyed by session token. The GET excludes the
// caller's own actor so each party only sees the other side typing.

use crate::handlers::session::resolve_live_session;
use crate::handlers::{internal_error, ApiError};
use crate::models::typing::*;
use crate::services::TypingService;
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    response::Json,
    routing::{delete, get, post, Router},
};
use serde_json::json;
use std::sync::Arc;

pub fn typing_routes() -> Router {
    Router::new()
        .route("/api/typing", post(set_typing))
        .route("/api/typing", get(get_typing))
        .route("/api/typing", delete(clear_typing))
}

async fn set_typing(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<SetTypingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = resolve_live_session(&state, &payload.session_token).await?;
    let actor = payload.actor.as_deref().unwrap_or(ACTOR_CUSTOMER);

    TypingService::set_typing(
        &state.db_pool,
        &state.hub,
        session.id,
        actor,
        payload.is_typing,
    )
    .await
    .map_err(|e| internal_error("Failed to update typing indicator", e))?;

    Ok(Json(json!({ "success": true })))
}

async fn get_typing(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TypingQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = resolve_live_session(&state, &query.session_token).await?;
    let actor = query.actor.as_deref().unwrap_or(ACTOR_CUSTOMER);

    let now = chrono::Utc::now();
    let indicators: Vec<_> = TypingService::active_for(&state.db_pool, session.id, actor)
        .await
        .map_err(|e| internal_error("Failed to load typing indicators", e))?
        .into_iter()
        // The query already filters on expires_at, this re-checks against
        // the clock we report with.
        .filter(|t| !t.is_expired(now))
        .collect();

    Ok(Json(json!({
        "success": true,
        "typing": indicators,
    })))
}

async fn clear_typing(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TypingQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = resolve_live_session(&state, &query.session_token).await?;
    let actor = query.actor.as_deref().unwrap_or(ACTOR_CUSTOMER);

    TypingService::set_typing(&state.db_pool, &state.hub, session.id, actor, false)
        .await
        .map_err(|e| internal_error("Failed to clear typing indicator", e))?;

    Ok(Json(json!({ "success": true })))
}
