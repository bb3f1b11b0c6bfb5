use super::state::AppState;
use crate::session::SessionOptions;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// Provider transcript/meeting id to monitor
    pub transcript_id: String,

    /// Optional briefing text prepended to every advisory prompt
    pub prep_context: Option<String>,

    /// Disable the hint throttle (simulation sessions only)
    #[serde(default)]
    pub no_throttle: bool,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct StopSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ReadBufferQuery {
    /// RFC3339 watermark; events strictly after it are returned
    pub since: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrepareRequest {
    pub candidate_cv: String,
    pub job_description: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct PrepareResponse {
    pub prep_brief: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.registry.session_count().await,
    })
}

/// POST /api/session/start
/// Start monitoring a transcript. Idempotent per transcript id.
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    if req.transcript_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "transcript_id required".to_string(),
            }),
        )
            .into_response();
    }

    let options = SessionOptions {
        prep_brief: req.prep_context,
        no_throttle: req.no_throttle,
    };
    let (session_id, created) = state
        .registry
        .start_session(req.transcript_id.trim(), options)
        .await;

    let status = if created { "started" } else { "already_active" };
    info!("Session {} {}", session_id, status);

    (
        StatusCode::OK,
        Json(StartSessionResponse {
            session_id,
            status: status.to_string(),
        }),
    )
        .into_response()
}

/// POST /api/session/stop
pub async fn stop_session(
    State(state): State<AppState>,
    Json(req): Json<StopSessionRequest>,
) -> impl IntoResponse {
    if state.registry.stop_session(&req.session_id).await {
        (
            StatusCode::OK,
            Json(StopSessionResponse {
                status: "stopped".to_string(),
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Session not found".to_string(),
            }),
        )
            .into_response()
    }
}

/// GET /api/session/:session_id/hints?since=<rfc3339>
/// Short-poll read of both delivery buffers.
pub async fn read_session_buffers(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<ReadBufferQuery>,
) -> impl IntoResponse {
    let since = query
        .since
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<DateTime<Utc>>().ok());

    match state.registry.read_since(&session_id, since).await {
        Some(readout) => (StatusCode::OK, Json(readout)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Session not found".to_string(),
            }),
        )
            .into_response(),
    }
}

/// POST /api/prepare
/// Generate a pre-interview briefing.
pub async fn prepare(
    State(state): State<AppState>,
    Json(req): Json<PrepareRequest>,
) -> impl IntoResponse {
    match state
        .advisor
        .generate_prep_brief(&req.candidate_cv, &req.job_description, &req.role)
        .await
    {
        Ok(prep_brief) => (StatusCode::OK, Json(PrepareResponse { prep_brief })).into_response(),
        Err(e) => {
            error!("Prep brief generation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Prep brief generation failed: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// GET /api/meetings/active
pub async fn active_meetings(State(state): State<AppState>) -> impl IntoResponse {
    match state.source.active_meetings().await {
        Ok(meetings) => (StatusCode::OK, Json(meetings)).into_response(),
        Err(e) => provider_error(e),
    }
}

/// GET /api/meetings/recent
pub async fn recent_transcripts(State(state): State<AppState>) -> impl IntoResponse {
    match state.source.recent_transcripts(10).await {
        Ok(transcripts) => (StatusCode::OK, Json(transcripts)).into_response(),
        Err(e) => provider_error(e),
    }
}

/// GET /api/transcript/:id
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.source.transcript(&id).await {
        Ok(transcript) => (StatusCode::OK, Json(transcript)).into_response(),
        Err(e) => provider_error(e),
    }
}

fn provider_error(e: anyhow::Error) -> axum::response::Response {
    error!("Provider request failed: {}", e);
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: format!("Provider request failed: {}", e),
        }),
    )
        .into_response()
}
