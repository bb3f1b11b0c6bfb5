use super::{
    ConnectionStatus, StreamEvent, TranscriptEvent, TranscriptSource, UtteranceSegment,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Persistent realtime subscription to the transcript provider.
///
/// Forwards status transitions and chunks as the provider pushes them, with a
/// socket-layer dedup map (last-seen text per chunk id) as the first line of
/// defense against re-broadcasts. Does not reconnect: when the stream ends it
/// reports `disconnected` and leaves recovery to the supervisor.
pub struct StreamingAdapter {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamingAdapter {
    pub fn start(
        source: Arc<dyn TranscriptSource>,
        external_id: String,
        events: mpsc::Sender<TranscriptEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let _ = events
                .send(TranscriptEvent::Status(ConnectionStatus::Connecting))
                .await;

            let mut subscription = match source.subscribe(&external_id).await {
                Ok(sub) => sub,
                Err(e) => {
                    warn!("Realtime subscribe failed for {}: {}", external_id, e);
                    let _ = events
                        .send(TranscriptEvent::Status(ConnectionStatus::Error))
                        .await;
                    return;
                }
            };

            info!("Streaming adapter started for {}", external_id);

            let mut seen: HashMap<String, String> = HashMap::new();

            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = subscription.events.recv() => event,
                };

                match event {
                    None => {
                        // Stream ended without an explicit disconnect event.
                        let _ = events
                            .send(TranscriptEvent::Status(ConnectionStatus::Disconnected))
                            .await;
                        break;
                    }
                    Some(StreamEvent::Status(status)) => {
                        if events.send(TranscriptEvent::Status(status)).await.is_err() {
                            break;
                        }
                        if status == ConnectionStatus::Disconnected {
                            break;
                        }
                    }
                    Some(StreamEvent::Chunk(chunk)) => {
                        if seen.get(&chunk.chunk_id).map(String::as_str) == Some(chunk.text.as_str())
                        {
                            continue;
                        }
                        seen.insert(chunk.chunk_id.clone(), chunk.text.clone());

                        if let Some(segment) = UtteranceSegment::from_chunk(chunk) {
                            if events.send(TranscriptEvent::Segment(segment)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }

            subscription.close();
            info!("Streaming adapter stopped for {}", external_id);
        });

        Self { cancel, task }
    }

    /// Close the subscription and wait for the forwarding loop to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Streaming task panicked: {}", e);
        }
    }
}
