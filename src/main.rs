use axum::{Extension, Router};
use rand::Rng;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

mod ai_client;
mod db;
mod handlers;
mod middleware;
mod models;
mod realtime;
mod services;

use ai_client::OpenAiCompatClient;
use realtime::RealtimeHub;

/// Seconds between maintenance sweeps; each tick adds a little jitter so
/// multiple instances do not sweep in lockstep.
const SWEEP_INTERVAL_SECS: u64 = 60;

pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub hub: RealtimeHub,
    pub ai_client: Option<OpenAiCompatClient>,
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    let db_pool = db::create_pool()
        .await
        .expect("Failed to create database pool.");

    // AI replies degrade to the canned fallback when no key is configured
    let ai_client = match OpenAiCompatClient::from_env() {
        Some(client) => {
            tracing::info!("Initializing AI completion client...");
            Some(client)
        }
        None => {
            tracing::warn!("AI_API_KEY not found. Customer messages will receive the fallback reply.");
            tracing::info!("To enable AI replies, set: AI_API_KEY and optionally AI_BASE_URL, AI_MODEL");
            None
        }
    };

    if let Err(e) = services::KnowledgeBaseService::seed_defaults(&db_pool).await {
        tracing::warn!("Failed to seed knowledge base defaults: {}", e);
    }

    let hub = RealtimeHub::new();

    let shared_state = Arc::new(AppState {
        db_pool,
        hub,
        ai_client,
    });

    let app = Router::new()
        .merge(handlers::auth::auth_routes())
        .merge(handlers::session::session_routes())
        .merge(handlers::messages::message_routes())
        .merge(handlers::typing::typing_routes())
        .merge(handlers::settings::settings_routes())
        .merge(handlers::status::status_routes())
        .merge(handlers::realtime::realtime_routes())
        .merge(handlers::agent::agent_routes())
        .layer(axum::middleware::from_fn(
            middleware::logging::request_logging_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(Extension(shared_state.clone()));

    // Background maintenance: expire sessions, clear stale typing rows, and
    // refresh customer presence. Readers never depend on this having run;
    // the lazy timestamp checks are authoritative.
    let sweep_state = shared_state.clone();
    tokio::spawn(async move {
        tracing::info!("Starting maintenance sweep loop ({}s interval)", SWEEP_INTERVAL_SECS);
        loop {
            let jitter = rand::thread_rng().gen_range(0..5);
            tokio::time::sleep(tokio::time::Duration::from_secs(SWEEP_INTERVAL_SECS + jitter))
                .await;

            match services::SessionService::sweep_expired(&sweep_state.db_pool).await {
                Ok(_) => {}
                Err(e) => tracing::error!("Session sweep failed: {}", e),
            }
            match services::TypingService::sweep_expired(&sweep_state.db_pool).await {
                Ok(n) if n > 0 => tracing::debug!("Swept {} expired typing indicators", n),
                Ok(_) => {}
                Err(e) => tracing::error!("Typing sweep failed: {}", e),
            }
            match services::SessionService::refresh_customer_presence(&sweep_state.db_pool).await {
                Ok(n) if n > 0 => tracing::debug!("Marked {} customers offline", n),
                Ok(_) => {}
                Err(e) => tracing::error!("Customer presence refresh failed: {}", e),
            }

            sweep_state.hub.prune().await;
        }
    });

    let bind_addr =
        std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Server error");
}

// Logging configuration: human-readable by default, JSON when LOG_FORMAT=json
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,support_desk=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,support_desk=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("SupportDesk starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Build mode: {}",
        if cfg!(debug_assertions) { "development" } else { "production" }
    );
    tracing::info!("Log level: {}", log_level);

    Ok(())
}
