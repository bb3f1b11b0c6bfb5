// Shared fakes for integration tests: a scripted transcript source and a
// countable advisor, both implementing the seam traits.

#![allow(dead_code)]

use anyhow::{bail, Result};
use livecoach::advisory::Advisor;
use livecoach::session::{SessionLimits, SessionRegistry};
use livecoach::transcript::{
    Sentence, StreamChunk, StreamEvent, StreamSubscription, SupervisorConfig, TranscriptSource,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Transcript source driven entirely by the test: streamed events are pushed
/// through senders handed out by `subscribe`, polled sentences come from a
/// scripted list.
pub struct FakeSource {
    sentences: Mutex<Vec<Sentence>>,
    stream_senders: Mutex<Vec<mpsc::Sender<StreamEvent>>>,
    pub poll_calls: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
    fail_subscribe: AtomicBool,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sentences: Mutex::new(Vec::new()),
            stream_senders: Mutex::new(Vec::new()),
            poll_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            fail_subscribe: AtomicBool::new(false),
        })
    }

    pub fn set_sentences(&self, sentences: Vec<Sentence>) {
        *self.sentences.lock().unwrap() = sentences;
    }

    pub fn refuse_subscriptions(&self) {
        self.fail_subscribe.store(true, Ordering::SeqCst);
    }

    pub fn subscription_count(&self) -> usize {
        self.stream_senders.lock().unwrap().len()
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    fn try_stream_sender(&self) -> Option<mpsc::Sender<StreamEvent>> {
        self.stream_senders.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl TranscriptSource for FakeSource {
    async fn subscribe(&self, _external_id: &str) -> Result<StreamSubscription> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            bail!("subscription refused");
        }
        let (tx, rx) = mpsc::channel(64);
        self.stream_senders.lock().unwrap().push(tx);
        Ok(StreamSubscription::new(rx, CancellationToken::new()))
    }

    async fn sentences_after(
        &self,
        _external_id: &str,
        after: Option<u64>,
    ) -> Result<Vec<Sentence>> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let sentences = self.sentences.lock().unwrap().clone();
        Ok(sentences
            .into_iter()
            .filter(|s| after.map_or(true, |watermark| s.index > watermark))
            .collect())
    }
}

/// Wait until the adapter under test has opened a subscription, then hand out
/// its event sender.
pub async fn stream_sender(source: &FakeSource) -> mpsc::Sender<StreamEvent> {
    for _ in 0..100 {
        if let Some(tx) = source.try_stream_sender() {
            return tx;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no realtime subscription was opened");
}

/// Advisor that counts calls and replies with whatever the test scripted.
pub struct FakeAdvisor {
    calls: AtomicUsize,
    reply: Mutex<Option<String>>,
    fail: AtomicBool,
    delay: Mutex<Duration>,
}

impl FakeAdvisor {
    pub fn replying(hint: &str) -> Arc<Self> {
        let advisor = Self::silent();
        advisor.set_reply(Some(hint.to_string()));
        advisor
    }

    pub fn silent() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Mutex::new(None),
            fail: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn set_reply(&self, reply: Option<String>) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Advisor for FakeAdvisor {
    async fn generate_hint(&self, _context: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            bail!("advisor unavailable");
        }
        Ok(self.reply.lock().unwrap().clone())
    }

    async fn generate_prep_brief(
        &self,
        _candidate_cv: &str,
        _job_description: &str,
        _role: &str,
    ) -> Result<String> {
        Ok("stack, terms, questions".to_string())
    }
}

/// Supervisor timings that never fall back on their own.
pub fn quiet_supervisor() -> SupervisorConfig {
    SupervisorConfig {
        liveness_timeout: Duration::from_secs(30),
        poll_interval: Duration::from_secs(30),
    }
}

/// Default limits with a throttle window far longer than any test.
pub fn test_limits() -> SessionLimits {
    SessionLimits {
        min_hint_interval: Duration::from_secs(60),
        ..SessionLimits::default()
    }
}

pub fn make_registry(
    source: &Arc<FakeSource>,
    advisor: &Arc<FakeAdvisor>,
    supervisor: SupervisorConfig,
    limits: SessionLimits,
) -> Arc<SessionRegistry> {
    Arc::new(SessionRegistry::new(
        source.clone(),
        advisor.clone(),
        None,
        supervisor,
        limits,
    ))
}

pub fn chunk(id: &str, speaker: &str, text: &str) -> StreamEvent {
    chunk_from(id, Some(speaker), text)
}

pub fn chunk_from(id: &str, speaker: Option<&str>, text: &str) -> StreamEvent {
    StreamEvent::Chunk(StreamChunk {
        chunk_id: id.to_string(),
        text: text.to_string(),
        speaker_name: speaker.map(str::to_string),
        start_time: 0.0,
        end_time: 1.0,
    })
}

pub fn sentence(index: u64, speaker: &str, text: &str) -> Sentence {
    Sentence {
        index,
        text: text.to_string(),
        speaker_name: Some(speaker.to_string()),
        start_time: index as f64,
        end_time: index as f64 + 1.0,
    }
}
