use super::{ConnectionStatus, TranscriptEvent, TranscriptSource, UtteranceSegment};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Watermark-based fetch loop over the polled transcript query.
///
/// Every tick fetches sentences past the last-seen index and emits them in
/// order. A failed fetch is logged and the next tick runs on schedule; a
/// fetch still in flight when `stop()` is called completes but its results
/// are discarded.
pub struct PollingAdapter {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollingAdapter {
    pub fn start(
        source: Arc<dyn TranscriptSource>,
        external_id: String,
        events: mpsc::Sender<TranscriptEvent>,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            info!("Polling adapter started for {} ({:?} interval)", external_id, interval);

            let mut watermark: Option<u64> = None;
            let mut announced = false;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let batch = match source.sentences_after(&external_id, watermark).await {
                    Ok(batch) => batch,
                    Err(e) => {
                        warn!("Transcript poll failed for {}: {}", external_id, e);
                        continue;
                    }
                };

                // Stop may have been requested while the fetch was in flight.
                if token.is_cancelled() {
                    break;
                }

                if !announced {
                    announced = true;
                    if events
                        .send(TranscriptEvent::Status(ConnectionStatus::Listening))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }

                let mut stopped = false;
                for sentence in batch {
                    if token.is_cancelled() {
                        stopped = true;
                        break;
                    }
                    // Advance the watermark even for sentences filtered out below,
                    // so empty revisions are not refetched forever.
                    watermark = Some(sentence.index);
                    if let Some(segment) = UtteranceSegment::from_sentence(&external_id, sentence)
                    {
                        if events.send(TranscriptEvent::Segment(segment)).await.is_err() {
                            stopped = true;
                            break;
                        }
                    }
                }
                if stopped {
                    break;
                }
            }

            info!("Polling adapter stopped for {}", external_id);
        });

        Self { cancel, task }
    }

    /// Halt scheduling and wait for the loop to wind down.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Polling task panicked: {}", e);
        }
    }
}
