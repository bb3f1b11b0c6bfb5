use super::{
    ConnectionStatus, PollingAdapter, StreamingAdapter, TranscriptEvent, TranscriptSource,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Timing knobs for the supervisor, overridable for tests and simulation.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How long the streaming transport may stay silent before fallback
    pub liveness_timeout: Duration,

    /// Fixed tick interval for the polling fallback
    pub poll_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            liveness_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Which transport is currently driving the connection.
enum ActiveTransport {
    Streaming(StreamingAdapter),
    Polling(PollingAdapter),
    None,
}

impl ActiveTransport {
    async fn shutdown(self) {
        match self {
            ActiveTransport::Streaming(adapter) => adapter.stop().await,
            ActiveTransport::Polling(adapter) => adapter.stop().await,
            ActiveTransport::None => {}
        }
    }
}

/// Owns the adapter lifecycle for one logical session.
///
/// Starts with the streaming transport. Falls back to polling when the stream
/// stays silent past the liveness window, reports an authentication failure
/// (immediately, no liveness wait - the polled path authenticates on its own),
/// or explicitly disconnects. Once a streamed segment has arrived the liveness
/// timer is disarmed for good; only an explicit disconnect triggers fallback
/// after that.
///
/// Every status and accepted segment of the active adapter is forwarded in
/// receipt order. A slow teardown can briefly leave both adapters emitting;
/// the session-level deduplicator absorbs the overlap.
pub struct ConnectionSupervisor {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionSupervisor {
    pub fn open(
        source: Arc<dyn TranscriptSource>,
        external_id: String,
        events: mpsc::Sender<TranscriptEvent>,
        config: SupervisorConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(drive(source, external_id, events, config, token));

        Self {
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Tear down whichever transport is active. Idempotent and safe to call
    /// concurrently with in-flight adapter events.
    pub async fn close(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().await.take();
        if let Some(task) = handle {
            if let Err(e) = task.await {
                error!("Supervisor task panicked: {}", e);
            }
        }
    }
}

async fn drive(
    source: Arc<dyn TranscriptSource>,
    external_id: String,
    events: mpsc::Sender<TranscriptEvent>,
    config: SupervisorConfig,
    cancel: CancellationToken,
) {
    // All adapters emit into one internal channel; keeping adapter_tx alive
    // here means recv() below can only yield Some.
    let (adapter_tx, mut adapter_rx) = mpsc::channel::<TranscriptEvent>(64);

    let mut transport = ActiveTransport::Streaming(StreamingAdapter::start(
        source.clone(),
        external_id.clone(),
        adapter_tx.clone(),
    ));
    info!("Supervisor opened streaming transport for {}", external_id);

    // Armed until the stream proves itself with a segment.
    let mut liveness_deadline = Some(Instant::now() + config.liveness_timeout);
    let mut on_polling = false;

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep_until_deadline(liveness_deadline), if liveness_deadline.is_some() => {
                warn!(
                    "No streamed segment within {:?} for {}, falling back to polling",
                    config.liveness_timeout, external_id
                );
                liveness_deadline = None;
                switch_to_polling(&mut transport, &source, &external_id, &adapter_tx, &config);
                on_polling = true;
                continue;
            }
            event = adapter_rx.recv() => event,
        };

        let event = match event {
            Some(event) => event,
            None => break,
        };

        match event {
            TranscriptEvent::Segment(segment) => {
                // Data is flowing: disarm the liveness timer for this
                // connection's lifetime.
                liveness_deadline = None;
                if events.send(TranscriptEvent::Segment(segment)).await.is_err() {
                    break;
                }
            }
            TranscriptEvent::Status(status) => {
                if events.send(TranscriptEvent::Status(status)).await.is_err() {
                    break;
                }
                if on_polling {
                    continue;
                }
                match status {
                    ConnectionStatus::AuthFailed => {
                        // The polled path authenticates independently, so an
                        // auth failure on the socket skips the liveness wait.
                        warn!(
                            "Streaming auth failed for {}, falling back to polling",
                            external_id
                        );
                        liveness_deadline = None;
                        switch_to_polling(
                            &mut transport,
                            &source,
                            &external_id,
                            &adapter_tx,
                            &config,
                        );
                        on_polling = true;
                    }
                    ConnectionStatus::Disconnected => {
                        info!(
                            "Streaming transport for {} disconnected, falling back to polling",
                            external_id
                        );
                        liveness_deadline = None;
                        switch_to_polling(
                            &mut transport,
                            &source,
                            &external_id,
                            &adapter_tx,
                            &config,
                        );
                        on_polling = true;
                    }
                    _ => {}
                }
            }
        }
    }

    transport.shutdown().await;
    info!("Supervisor closed for {}", external_id);
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn switch_to_polling(
    transport: &mut ActiveTransport,
    source: &Arc<dyn TranscriptSource>,
    external_id: &str,
    adapter_tx: &mpsc::Sender<TranscriptEvent>,
    config: &SupervisorConfig,
) {
    let previous = std::mem::replace(transport, ActiveTransport::None);
    // Teardown of the old transport may lag; duplicates it produces in the
    // meantime are removed by the deduplicator downstream.
    tokio::spawn(previous.shutdown());
    *transport = ActiveTransport::Polling(PollingAdapter::start(
        source.clone(),
        external_id.to_string(),
        adapter_tx.clone(),
        config.poll_interval,
    ));
}
