use super::state::AppState;
use crate::session::Session;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// GET /ws/session/:session_id
/// Push channel: every segment, hint, and status change of the session is
/// forwarded to the client as a JSON `PushEvent`.
pub async fn session_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    match state.registry.get(&session_id).await {
        Some(session) => ws
            .on_upgrade(move |socket| forward_events(socket, session))
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Session not found").into_response(),
    }
}

async fn forward_events(mut socket: WebSocket, session: Arc<Session>) {
    debug!("Push client attached to session {}", session.id);
    let mut events = session.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Failed to encode push event: {}", e);
                            continue;
                        }
                    };
                    if socket.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                // Slow consumer: skip what was missed, keep streaming.
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Push client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {} // clients have nothing to say to us
            },
        }
    }

    debug!("Push client detached from session {}", session.id);
}
