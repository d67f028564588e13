// Agent authentication: a thin JWT wrapper. Accounts are created with the
// create_agent binary, not through a public endpoint.

use crate::handlers::{api_error, internal_error, ApiError};
use crate::models::auth::*;
use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
    routing::{get, post, Router},
};
use bcrypt::verify;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde_json::json;
use std::sync::Arc;

pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/verify", get(verify_token))
}

async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Email and password are required",
        ));
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE email = $1 AND is_active = true",
    )
    .bind(payload.email.trim().to_lowercase())
    .fetch_optional(&state.db_pool)
    .await
    .map_err(|e| internal_error("Database error during login", e))?;

    let Some(user) = user else {
        return Err(api_error(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    };

    let valid = verify(&payload.password, &user.password_hash)
        .map_err(|e| internal_error("Password verification error", e))?;
    if !valid {
        return Err(api_error(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }

    let token = generate_jwt_token(&user)?;
    tracing::info!("Agent {} logged in", user.id);

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        user: UserResponse::from(user),
        token,
    }))
}

async fn verify_token(
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Missing bearer token"))?;

    let claims = verify_jwt_token(token)
        .map_err(|_| api_error(StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;

    Ok(Json(json!({
        "success": true,
        "user": {
            "id": claims.sub,
            "username": claims.username,
            "email": claims.email,
            "is_admin": claims.is_admin,
        }
    })))
}

pub fn generate_jwt_token(user: &User) -> Result<String, ApiError> {
    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "default_secret".to_string());

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .expect("valid timestamp")
        .timestamp();

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin,
        exp: expiration as usize,
        iat: Utc::now().timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .map_err(|e| internal_error("Error generating JWT token", e))
}

pub fn verify_jwt_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "default_secret".to_string());

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 42,
            email: "agent@example.com".to_string(),
            username: "agent".to_string(),
            password_hash: String::new(),
            is_active: true,
            is_admin: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trips_to_agent_id() {
        let token = generate_jwt_token(&user()).expect("token");
        let claims = verify_jwt_token(&token).expect("claims");
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.username, "agent");
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_jwt_token("not.a.token").is_err());
    }
}
