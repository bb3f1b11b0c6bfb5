use super::{
    ConnectionStatus, MeetingSummary, Sentence, StreamChunk, StreamEvent, StreamSubscription,
    Transcript, TranscriptSource, TranscriptSummary,
};
use anyhow::{anyhow, bail, Context, Result};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_GRAPHQL_URL: &str = "https://api.fireflies.ai/graphql";
const DEFAULT_REALTIME_URL: &str = "wss://api.fireflies.ai/ws/realtime";

/// Fireflies API client: GraphQL queries for transcripts and meetings, plus a
/// realtime websocket subscription for live transcription.
pub struct FirefliesSource {
    http: reqwest::Client,
    api_key: String,
    graphql_url: String,
    realtime_url: String,
}

impl FirefliesSource {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            realtime_url: DEFAULT_REALTIME_URL.to_string(),
        }
    }

    pub fn with_endpoints(mut self, graphql_url: String, realtime_url: String) -> Self {
        self.graphql_url = graphql_url;
        self.realtime_url = realtime_url;
        self
    }

    async fn gql<T: DeserializeOwned>(&self, query: &str, variables: serde_json::Value) -> Result<T> {
        let response = self
            .http
            .post(&self.graphql_url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .context("GraphQL request failed")?
            .error_for_status()
            .context("GraphQL request rejected")?;

        let body: GqlResponse<T> = response
            .json()
            .await
            .context("Failed to parse GraphQL response")?;

        if let Some(errors) = body.errors {
            if !errors.is_empty() {
                let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
                bail!("GraphQL errors: {}", messages.join(", "));
            }
        }

        body.data
            .ok_or_else(|| anyhow!("GraphQL response missing data"))
    }
}

#[derive(Deserialize)]
struct GqlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GqlError>>,
}

#[derive(Deserialize)]
struct GqlError {
    message: String,
}

#[derive(Deserialize)]
struct ActiveMeetingsData {
    #[serde(default)]
    active_meetings: Vec<MeetingSummary>,
}

#[derive(Deserialize)]
struct TranscriptData {
    transcript: Option<Transcript>,
}

#[derive(Deserialize)]
struct TranscriptsData {
    #[serde(default)]
    transcripts: Vec<TranscriptSummary>,
}

/// One frame of the realtime protocol: an event name plus a payload.
#[derive(Debug, Deserialize)]
struct RealtimeMessage {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[async_trait::async_trait]
impl TranscriptSource for FirefliesSource {
    async fn subscribe(&self, external_id: &str) -> Result<StreamSubscription> {
        let mut request = self
            .realtime_url
            .as_str()
            .into_client_request()
            .context("Invalid realtime URL")?;
        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .context("Invalid API key header")?,
        );

        info!("Connecting to realtime socket for transcript {}", external_id);

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .context("Realtime socket connect failed")?;

        let (events_tx, events_rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let auth = json!({
            "event": "auth",
            "token": format!("Bearer {}", self.api_key),
            "transcript_id": external_id,
        });

        tokio::spawn(async move {
            let (mut write, mut read) = ws.split();

            let _ = events_tx
                .send(StreamEvent::Status(ConnectionStatus::Connected))
                .await;

            if let Err(e) = write.send(Message::Text(auth.to_string())).await {
                warn!("Failed to send realtime auth: {}", e);
                let _ = events_tx
                    .send(StreamEvent::Status(ConnectionStatus::Error))
                    .await;
                return;
            }

            loop {
                let message = tokio::select! {
                    _ = token.cancelled() => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    message = read.next() => message,
                };

                match message {
                    Some(Ok(Message::Text(text))) => {
                        let frame: RealtimeMessage = match serde_json::from_str(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!("Unparseable realtime frame: {}", e);
                                continue;
                            }
                        };
                        let event = match frame.event.as_str() {
                            "auth.success" => {
                                StreamEvent::Status(ConnectionStatus::Authenticated)
                            }
                            "auth.failed" => StreamEvent::Status(ConnectionStatus::AuthFailed),
                            "connection.established" => {
                                StreamEvent::Status(ConnectionStatus::Listening)
                            }
                            "connection.error" => StreamEvent::Status(ConnectionStatus::Error),
                            "transcription.broadcast" => {
                                match serde_json::from_value::<StreamChunk>(frame.data) {
                                    Ok(chunk) => StreamEvent::Chunk(chunk),
                                    Err(e) => {
                                        warn!("Unparseable transcription chunk: {}", e);
                                        continue;
                                    }
                                }
                            }
                            other => {
                                debug!("Ignoring realtime event {}", other);
                                continue;
                            }
                        };
                        if events_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong/binary
                    Some(Err(e)) => {
                        warn!("Realtime socket error: {}", e);
                        let _ = events_tx
                            .send(StreamEvent::Status(ConnectionStatus::Error))
                            .await;
                        break;
                    }
                }
            }

            debug!("Realtime socket task exiting");
        });

        Ok(StreamSubscription::new(events_rx, cancel))
    }

    async fn sentences_after(
        &self,
        external_id: &str,
        after: Option<u64>,
    ) -> Result<Vec<Sentence>> {
        let transcript = self.transcript(external_id).await?;
        let mut sentences: Vec<Sentence> = transcript
            .sentences
            .into_iter()
            .filter(|s| after.map_or(true, |watermark| s.index > watermark))
            .collect();
        sentences.sort_by_key(|s| s.index);
        Ok(sentences)
    }

    async fn active_meetings(&self) -> Result<Vec<MeetingSummary>> {
        let query = r#"
            query ActiveMeetings {
                active_meetings {
                    id
                    title
                    organizer_email
                    meeting_link
                    start_time
                    state
                }
            }
        "#;
        let data: ActiveMeetingsData = self.gql(query, json!({})).await?;
        Ok(data.active_meetings)
    }

    async fn recent_transcripts(&self, limit: u32) -> Result<Vec<TranscriptSummary>> {
        let query = r#"
            query RecentTranscripts($limit: Int) {
                transcripts(limit: $limit, mine: true) {
                    id
                    title
                    date
                    duration
                }
            }
        "#;
        let data: TranscriptsData = self.gql(query, json!({ "limit": limit })).await?;
        Ok(data.transcripts)
    }

    async fn transcript(&self, id: &str) -> Result<Transcript> {
        let query = r#"
            query GetTranscript($id: String!) {
                transcript(id: $id) {
                    id
                    title
                    duration
                    sentences {
                        index
                        text
                        speaker_name
                        start_time
                        end_time
                    }
                }
            }
        "#;
        let data: TranscriptData = self.gql(query, json!({ "id": id })).await?;
        data.transcript
            .ok_or_else(|| anyhow!("Transcript {} not found", id))
    }
}
