//! HTTP API server for external control (browser extension, scripts)
//!
//! - POST /api/session/start - start monitoring a transcript
//! - POST /api/session/stop - stop a session
//! - GET /api/session/:id/hints - short-poll hints + segments since a watermark
//! - GET /ws/session/:id - push channel (segments, hints, status)
//! - GET /api/meetings/active, /api/meetings/recent, /api/transcript/:id - provider passthrough
//! - POST /api/prepare - pre-interview briefing
//! - GET /health - health check

mod handlers;
mod routes;
mod state;
mod ws;

pub use routes::create_router;
pub use state::AppState;
