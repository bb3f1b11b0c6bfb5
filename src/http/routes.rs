use super::state::AppState;
use super::{handlers, ws};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Provider directory
        .route("/api/meetings/active", get(handlers::active_meetings))
        .route("/api/meetings/recent", get(handlers::recent_transcripts))
        .route("/api/transcript/:id", get(handlers::get_transcript))
        // Session control
        .route("/api/session/start", post(handlers::start_session))
        .route("/api/session/stop", post(handlers::stop_session))
        // Short-poll buffer read
        .route(
            "/api/session/:session_id/hints",
            get(handlers::read_session_buffers),
        )
        // Pre-interview prep
        .route("/api/prepare", post(handlers::prepare))
        // Push channel
        .route("/ws/session/:session_id", get(ws::session_events))
        // Request logging + permissive CORS for the extension
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
