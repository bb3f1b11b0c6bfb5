//! Transcript ingestion core
//!
//! This module owns the resilient connection to the transcript provider:
//! - `TranscriptSource` - the provider boundary (realtime socket + polled fetch)
//! - `StreamingAdapter` - persistent realtime subscription
//! - `PollingAdapter` - watermark-based fetch loop
//! - `ConnectionSupervisor` - streaming-first lifecycle with polling fallback
//! - `Deduplicator` - drops repeated chunks before they reach session state

mod dedup;
mod fireflies;
mod poll;
mod stream;
mod supervisor;

pub use dedup::Deduplicator;
pub use fireflies::FirefliesSource;
pub use poll::PollingAdapter;
pub use stream::StreamingAdapter;
pub use supervisor::{ConnectionSupervisor, SupervisorConfig};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Coarse connectivity status reported by an adapter.
///
/// This is not a strict state machine: each adapter reports its own subset,
/// in whatever order the transport produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Authenticated,
    Listening,
    AuthFailed,
    Disconnected,
    Error,
}

/// Identity of a speech chunk.
///
/// The realtime socket issues opaque chunk ids; the polled transcript only
/// has per-transcript sentence indices, so polled identities are keyed by
/// transcript id + index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SegmentId {
    Stream(String),
    Polled { transcript_id: String, index: u64 },
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentId::Stream(id) => write!(f, "{}", id),
            SegmentId::Polled {
                transcript_id,
                index,
            } => write!(f, "{}#{}", transcript_id, index),
        }
    }
}

impl Serialize for SegmentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single utterance from the conversation, normalized across transports.
#[derive(Debug, Clone, Serialize)]
pub struct UtteranceSegment {
    /// Chunk identity used for deduplication
    pub id: SegmentId,

    /// Speaker label ("Unknown" when the provider omits it)
    pub speaker: String,

    /// Spoken text, non-empty after trimming
    pub text: String,

    /// Offset of the utterance start within the call, in seconds
    pub start_time: f64,

    /// Offset of the utterance end within the call, in seconds
    pub end_time: f64,

    /// When this process received the segment
    pub received_at: DateTime<Utc>,
}

impl UtteranceSegment {
    /// Normalize a streamed chunk. Returns None when the trimmed text is empty.
    pub fn from_chunk(chunk: StreamChunk) -> Option<Self> {
        let text = chunk.text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            id: SegmentId::Stream(chunk.chunk_id),
            speaker: chunk.speaker_name.unwrap_or_else(|| "Unknown".to_string()),
            text: text.to_string(),
            start_time: chunk.start_time,
            end_time: chunk.end_time,
            received_at: Utc::now(),
        })
    }

    /// Normalize a polled sentence. Returns None when the trimmed text is empty.
    pub fn from_sentence(transcript_id: &str, sentence: Sentence) -> Option<Self> {
        let text = sentence.text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            id: SegmentId::Polled {
                transcript_id: transcript_id.to_string(),
                index: sentence.index,
            },
            speaker: sentence
                .speaker_name
                .unwrap_or_else(|| "Speaker".to_string()),
            text: text.to_string(),
            start_time: sentence.start_time,
            end_time: sentence.end_time,
            received_at: Utc::now(),
        })
    }
}

/// An indexed sentence from the polled transcript query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentence {
    pub index: u64,
    pub text: String,
    pub speaker_name: Option<String>,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
}

/// A chunk pushed over the realtime socket.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    pub chunk_id: String,
    pub text: String,
    pub speaker_name: Option<String>,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
}

/// Event pushed by a live subscription.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Status(ConnectionStatus),
    Chunk(StreamChunk),
}

/// Handle to a live subscription.
///
/// Events arrive on `events` until the subscription ends or `close()` is
/// called. Dropping the handle also tears the subscription down.
pub struct StreamSubscription {
    pub events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
}

impl StreamSubscription {
    pub fn new(events: mpsc::Receiver<StreamEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Tear down the underlying transport. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Event emitted by an adapter toward the session pipeline.
#[derive(Debug, Clone)]
pub enum TranscriptEvent {
    Segment(UtteranceSegment),
    Status(ConnectionStatus),
}

/// Summary of an in-progress meeting, as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingSummary {
    pub id: String,
    pub title: Option<String>,
    pub organizer_email: Option<String>,
    pub meeting_link: Option<String>,
    pub start_time: Option<String>,
    pub state: Option<String>,
}

/// Summary of a finished transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSummary {
    pub id: String,
    pub title: Option<String>,
    pub date: Option<serde_json::Value>,
    pub duration: Option<f64>,
}

/// A full transcript with its ordered sentences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub title: Option<String>,
    pub duration: Option<f64>,
    #[serde(default)]
    pub sentences: Vec<Sentence>,
}

/// Boundary to the transcript provider.
///
/// `subscribe` and `sentences_after` are the two ingestion paths the core
/// needs; the directory queries back the HTTP passthrough endpoints and the
/// Telegram commands, and have defaults so test doubles only implement the
/// ingestion seam.
#[async_trait::async_trait]
pub trait TranscriptSource: Send + Sync + 'static {
    /// Open a realtime subscription for one meeting/transcript id.
    async fn subscribe(&self, external_id: &str) -> Result<StreamSubscription>;

    /// Fetch sentences with index strictly greater than `after`, in index order.
    async fn sentences_after(&self, external_id: &str, after: Option<u64>)
        -> Result<Vec<Sentence>>;

    /// Meetings currently in progress.
    async fn active_meetings(&self) -> Result<Vec<MeetingSummary>> {
        Ok(Vec::new())
    }

    /// Most recent finished transcripts.
    async fn recent_transcripts(&self, _limit: u32) -> Result<Vec<TranscriptSummary>> {
        Ok(Vec::new())
    }

    /// Full transcript by id.
    async fn transcript(&self, id: &str) -> Result<Transcript> {
        bail!("transcript lookup not supported for {}", id)
    }
}
