// Health/statistics endpoint plus maintenance actions. Statistics degrade to
// zeros on store errors rather than failing the whole health check.

use crate::handlers::{api_error, internal_error, ApiError};
use crate::services::{SessionService, TypingService};
use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
    routing::{get, post, Router},
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

pub fn status_routes() -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/status", post(run_maintenance))
}

#[derive(Debug, Deserialize)]
struct MaintenanceRequest {
    action: String,
}

async fn count(pool: &PgPool, sql: &str) -> i64 {
    match sqlx::query_as::<_, (i64,)>(sql).fetch_one(pool).await {
        Ok(row) => row.0,
        Err(e) => {
            tracing::warn!("Statistics query failed: {}", e);
            0
        }
    }
}

async fn get_status(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<serde_json::Value> {
    let pool = &state.db_pool;
    let db_healthy = sqlx::query("SELECT 1").execute(pool).await.is_ok();

    let active_sessions = count(
        pool,
        "SELECT COUNT(*) FROM conversation_sessions WHERE is_active = true AND last_activity_at > NOW() - INTERVAL '30 minutes'",
    )
    .await;
    let open_chats = count(
        pool,
        "SELECT COUNT(*) FROM chats WHERE status IN ('OPEN', 'IN_PROGRESS', 'WAITING') AND is_deleted = false",
    )
    .await;
    let unassigned_chats = count(
        pool,
        "SELECT COUNT(*) FROM chats WHERE assigned_agent_id IS NULL AND status IN ('OPEN', 'WAITING') AND is_deleted = false",
    )
    .await;
    let online_customers = count(pool, "SELECT COUNT(*) FROM customers WHERE is_online = true").await;
    let total_messages = count(pool, "SELECT COUNT(*) FROM messages WHERE deleted_at IS NULL").await;

    Json(json!({
        "success": true,
        "status": if db_healthy { "ok" } else { "degraded" },
        "ai_enabled": state.ai_client.is_some(),
        "statistics": {
            "active_sessions": active_sessions,
            "open_chats": open_chats,
            "unassigned_chats": unassigned_chats,
            "online_customers": online_customers,
            "total_messages": total_messages,
        }
    }))
}

async fn run_maintenance(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<MaintenanceRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let affected = match payload.action.as_str() {
        "cleanup_expired_sessions" => SessionService::sweep_expired(&state.db_pool)
            .await
            .map_err(|e| internal_error("Session sweep failed", e))?,
        "cleanup_expired_typing" => TypingService::sweep_expired(&state.db_pool)
            .await
            .map_err(|e| internal_error("Typing sweep failed", e))?,
        "update_customer_status" => SessionService::refresh_customer_presence(&state.db_pool)
            .await
            .map_err(|e| internal_error("Customer presence refresh failed", e))?,
        other => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                &format!("Unknown maintenance action: {}", other),
            ));
        }
    };

    Ok(Json(json!({
        "success": true,
        "action": payload.action,
        "affected": affected,
    })))
}
