use crate::advisory::Advisor;
use crate::session::SessionRegistry;
use crate::transcript::TranscriptSource;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Session registry (the only owner of the id -> session mapping)
    pub registry: Arc<SessionRegistry>,

    /// Transcript provider, for directory passthrough endpoints
    pub source: Arc<dyn TranscriptSource>,

    /// Advisory service, for the prep-brief endpoint
    pub advisor: Arc<dyn Advisor>,
}
