use super::buffer::{HintEvent, PushEvent};
use super::hints;
use super::state::{SessionLimits, SessionState};
use crate::advisory::Advisor;
use crate::notify::Notifier;
use crate::transcript::{
    ConnectionSupervisor, Deduplicator, SupervisorConfig, TranscriptEvent, TranscriptSource,
    UtteranceSegment,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Default slice sizes when a buffer is read without a watermark,
/// matching what short-poll clients expect.
const DEFAULT_HINT_SLICE: usize = 5;
const DEFAULT_SEGMENT_SLICE: usize = 10;

/// One monitored conversation: its connection, state, and fan-out channel.
pub struct Session {
    pub id: String,
    pub external_id: String,
    pub state: Mutex<SessionState>,
    pub no_throttle: bool,
    events: broadcast::Sender<PushEvent>,
    closed: AtomicBool,
    supervisor: ConnectionSupervisor,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Subscribe to this session's push channel.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }

    /// Fan an event out to subscribed push clients. A session with no
    /// listeners is normal.
    pub fn publish(&self, event: PushEvent) {
        let _ = self.events.send(event);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.supervisor.close().await;
        let worker = self.worker.lock().await.take();
        if let Some(task) = worker {
            if let Err(e) = task.await {
                error!("Session worker panicked: {}", e);
            }
        }
        info!("Session {} closed", self.id);
    }
}

/// Events read back from a session's delivery buffers.
#[derive(Debug, Serialize)]
pub struct BufferReadout {
    pub hints: Vec<HintEvent>,
    pub segments: Vec<UtteranceSegment>,
}

/// Options for starting a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Briefing text prepended to every advisory prompt
    pub prep_brief: Option<String>,

    /// Disable the hint throttle (simulation/test sessions)
    pub no_throttle: bool,
}

/// Owns the session-id -> session mapping and is its only mutator.
///
/// Constructed once at process start and handed to every call site that needs
/// it (HTTP handlers, the Telegram bot, shutdown).
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    source: Arc<dyn TranscriptSource>,
    advisor: Arc<dyn Advisor>,
    notifier: Option<Arc<Notifier>>,
    supervisor_config: SupervisorConfig,
    limits: SessionLimits,
}

impl SessionRegistry {
    pub fn new(
        source: Arc<dyn TranscriptSource>,
        advisor: Arc<dyn Advisor>,
        notifier: Option<Arc<Notifier>>,
        supervisor_config: SupervisorConfig,
        limits: SessionLimits,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            source,
            advisor,
            notifier,
            supervisor_config,
            limits,
        }
    }

    /// Start monitoring a transcript. Idempotent: a repeat start for an
    /// external id with a live session returns the existing session id and
    /// opens no second connection. The bool is true when a session was
    /// actually created.
    pub async fn start_session(&self, external_id: &str, options: SessionOptions) -> (String, bool) {
        let session_id = format!("session_{}", external_id);

        {
            let sessions = self.sessions.read().await;
            if sessions.contains_key(&session_id) {
                return (session_id, false);
            }
        }

        let mut sessions = self.sessions.write().await;
        // Re-check: another caller may have won the race for the write lock.
        if sessions.contains_key(&session_id) {
            return (session_id, false);
        }

        let (events_tx, events_rx) = mpsc::channel(256);
        let supervisor = ConnectionSupervisor::open(
            self.source.clone(),
            external_id.to_string(),
            events_tx,
            self.supervisor_config.clone(),
        );
        let (push_tx, _) = broadcast::channel(256);

        let session = Arc::new(Session {
            id: session_id.clone(),
            external_id: external_id.to_string(),
            state: Mutex::new(SessionState::new(self.limits.clone(), options.prep_brief)),
            no_throttle: options.no_throttle,
            events: push_tx,
            closed: AtomicBool::new(false),
            supervisor,
            worker: Mutex::new(None),
        });

        let worker = tokio::spawn(run_pipeline(
            session.clone(),
            events_rx,
            self.advisor.clone(),
            self.notifier.clone(),
        ));
        *session.worker.lock().await = Some(worker);

        sessions.insert(session_id.clone(), session);
        info!("Session {} started for transcript {}", session_id, external_id);

        (session_id, true)
    }

    /// Stop a session and discard its state. Returns false when the id is
    /// unknown. Lookups fail immediately after this returns, even though
    /// network teardown may still be completing.
    pub async fn stop_session(&self, session_id: &str) -> bool {
        let session = { self.sessions.write().await.remove(session_id) };
        match session {
            Some(session) => {
                session.close().await;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Read both delivery buffers: everything strictly after the watermark,
    /// or the most recent slice when no watermark is given. None when the
    /// session is unknown.
    pub async fn read_since(
        &self,
        session_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Option<BufferReadout> {
        let session = self.get(session_id).await?;
        let state = session.state.lock().await;
        let readout = match since {
            Some(watermark) => BufferReadout {
                hints: state.hints.since(watermark),
                segments: state.segments.since(watermark),
            },
            None => BufferReadout {
                hints: state.hints.last(DEFAULT_HINT_SLICE),
                segments: state.segments.last(DEFAULT_SEGMENT_SLICE),
            },
        };
        Some(readout)
    }

    /// Close every session. Called on process shutdown.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<Session>> = {
            let mut map = self.sessions.write().await;
            map.drain().map(|(_, session)| session).collect()
        };
        for session in sessions {
            session.close().await;
        }
    }
}

/// Per-session pipeline: adapter events -> dedup -> state -> hint throttle.
///
/// The advisory call is spawned onto its own task so segment ingestion never
/// waits on the network.
async fn run_pipeline(
    session: Arc<Session>,
    mut events: mpsc::Receiver<TranscriptEvent>,
    advisor: Arc<dyn Advisor>,
    notifier: Option<Arc<Notifier>>,
) {
    let mut dedup = Deduplicator::new();

    while let Some(event) = events.recv().await {
        if session.is_closed() {
            break;
        }
        match event {
            TranscriptEvent::Status(status) => {
                debug!("Session {} transport status: {:?}", session.id, status);
                session.publish(PushEvent::Status { status });
            }
            TranscriptEvent::Segment(segment) => {
                if !dedup.admit(&segment.id, &segment.text) {
                    continue;
                }
                debug!("Session {} [{}]: {}", session.id, segment.speaker, segment.text);

                {
                    let mut state = session.state.lock().await;
                    state.record_segment(segment.clone());
                }
                session.publish(PushEvent::Segment(segment.clone()));

                let session = session.clone();
                let advisor = advisor.clone();
                let notifier = notifier.clone();
                tokio::spawn(async move {
                    hints::maybe_hint(&session, advisor.as_ref(), notifier.as_ref(), &segment)
                        .await;
                });
            }
        }
    }

    debug!("Session {} pipeline stopped", session.id);
}
