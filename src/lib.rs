pub mod advisory;
pub mod config;
pub mod http;
pub mod notify;
pub mod session;
pub mod transcript;

pub use advisory::{Advisor, OpenAiAdvisor};
pub use config::Config;
pub use http::{create_router, AppState};
pub use notify::Notifier;
pub use session::{
    BufferReadout, DeliveryBuffer, HintEvent, PushEvent, SessionLimits, SessionOptions,
    SessionRegistry, SessionState,
};
pub use transcript::{
    ConnectionStatus, ConnectionSupervisor, Deduplicator, FirefliesSource, PollingAdapter,
    SegmentId, Sentence, StreamChunk, StreamEvent, StreamSubscription, StreamingAdapter,
    SupervisorConfig, TranscriptEvent, TranscriptSource, UtteranceSegment,
};
