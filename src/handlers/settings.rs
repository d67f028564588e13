// Widget configuration. First read of a name creates the default row.

use crate::handlers::{internal_error, ApiError};
use crate::models::settings::*;
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    response::Json,
    routing::{get, Router},
};
use serde_json::json;
use std::sync::Arc;

const DEFAULT_SETTINGS_NAME: &str = "default";

pub fn settings_routes() -> Router {
    Router::new().route("/api/settings", get(get_settings))
}

async fn get_settings(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<SettingsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = query.name.as_deref().unwrap_or(DEFAULT_SETTINGS_NAME);

    let settings = sqlx::query_as::<_, WidgetSettings>(
        r#"
        INSERT INTO widget_settings (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET updated_at = widget_settings.updated_at
        RETURNING *
        "#,
    )
    .bind(name)
    .fetch_one(&state.db_pool)
    .await
    .map_err(|e| internal_error("Failed to load widget settings", e))?;

    Ok(Json(json!({
        "success": true,
        "settings": settings,
    })))
}
