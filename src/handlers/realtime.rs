// WebSocket fan-out of a session's realtime events: message change events
// and transient typing broadcasts. Clients that miss events (or never
// connect) fall back to polling the REST endpoints.

use crate::handlers::session::resolve_live_session;
use crate::realtime::session_channel;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;

pub fn realtime_routes() -> Router {
    Router::new().route("/api/realtime", get(realtime_handler))
}

#[derive(Debug, Deserialize)]
struct RealtimeQuery {
    #[serde(rename = "sessionToken")]
    session_token: String,
}

async fn realtime_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<RealtimeQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let session = match resolve_live_session(&state, &query.session_token).await {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };

    ws.on_upgrade(move |socket| stream_session_events(socket, state, session.id))
        .into_response()
}

async fn stream_session_events(socket: WebSocket, state: Arc<AppState>, session_id: i32) {
    let (mut sender, mut receiver) = socket.split();

    let mut changes = state
        .hub
        .subscribe("messages", "session_id", &session_id.to_string())
        .await;
    let mut broadcasts = state.hub.subscribe_channel(&session_channel(session_id)).await;

    tracing::debug!("Realtime stream opened for session {}", session_id);

    loop {
        let event = tokio::select! {
            change = changes.recv() => change,
            broadcast = broadcasts.recv() => broadcast,
            // Client-side close or ping traffic
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => continue,
                }
            }
        };

        let event = match event {
            Ok(event) => event,
            // A lagged receiver skipped events; the client re-syncs by
            // polling, so just keep streaming.
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Realtime stream for session {} lagged by {}", session_id, n);
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        };

        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to serialize realtime event: {}", e);
                continue;
            }
        };

        if sender.send(Message::Text(text)).await.is_err() {
            break;
        }
    }

    tracing::debug!("Realtime stream closed for session {}", session_id);
}
