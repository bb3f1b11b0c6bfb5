//! Telegram command loop
//!
//! Long-polls for commands and drives the session registry from chat:
//! `/active` and `/recent` list meetings, `/connect <id>` starts a session
//! whose hints and status changes are pushed to the chat, `/stop` ends it,
//! `/prepdata <role>|<cv>|<jd>` generates a prep brief.

use crate::advisory::Advisor;
use crate::session::{PushEvent, SessionOptions, SessionRegistry};
use crate::transcript::{ConnectionStatus, TranscriptSource};
use crate::Notifier;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const POLL_TIMEOUT_SECS: u64 = 30;

/// Telegram caps messages at 4096 characters.
const MESSAGE_CHUNK: usize = 4000;

#[derive(Debug, Deserialize)]
pub(crate) struct UpdatesResponse {
    #[serde(default)]
    pub result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Chat {
    pub id: i64,
}

/// Per-chat bookkeeping: which session this chat is following, and the task
/// forwarding its push events.
struct ChatSession {
    session_id: String,
    forwarder: JoinHandle<()>,
}

/// Run the command loop until the process shuts down.
pub async fn run(
    notifier: Arc<Notifier>,
    registry: Arc<SessionRegistry>,
    source: Arc<dyn TranscriptSource>,
    advisor: Arc<dyn Advisor>,
) {
    info!("Telegram bot started");

    let mut offset: i64 = 0;
    let mut chats: HashMap<i64, ChatSession> = HashMap::new();

    loop {
        let updates = match notifier.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Telegram poll failed: {}", e);
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else { continue };
            let Some(text) = message.text else { continue };
            let chat_id = message.chat.id;

            handle_command(
                &notifier, &registry, &source, &advisor, &mut chats, chat_id, &text,
            )
            .await;
        }
    }
}

async fn handle_command(
    notifier: &Arc<Notifier>,
    registry: &Arc<SessionRegistry>,
    source: &Arc<dyn TranscriptSource>,
    advisor: &Arc<dyn Advisor>,
    chats: &mut HashMap<i64, ChatSession>,
    chat_id: i64,
    text: &str,
) {
    let chat = chat_id.to_string();
    let (command, rest) = match text.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (text.trim(), ""),
    };

    match command {
        "/start" => {
            reply(
                notifier,
                &chat,
                "Live interview coach ready.\n\n\
                 /active - meetings in progress\n\
                 /recent - recent transcripts\n\
                 /connect <id> - follow a call\n\
                 /stop - stop following\n\
                 /prepdata <role>|<cv>|<jd> - prep brief",
            )
            .await;
        }
        "/active" => match source.active_meetings().await {
            Ok(meetings) if meetings.is_empty() => {
                reply(notifier, &chat, "No meetings in progress.").await;
            }
            Ok(meetings) => {
                let lines: Vec<String> = meetings
                    .iter()
                    .enumerate()
                    .map(|(i, m)| {
                        format!(
                            "{}. {}\n   id: {}",
                            i + 1,
                            m.title.as_deref().unwrap_or("(untitled)"),
                            m.id
                        )
                    })
                    .collect();
                reply(
                    notifier,
                    &chat,
                    &format!("Meetings in progress:\n{}\n\nUse /connect <id>", lines.join("\n")),
                )
                .await;
            }
            Err(e) => reply(notifier, &chat, &format!("Lookup failed: {}", e)).await,
        },
        "/recent" => match source.recent_transcripts(5).await {
            Ok(transcripts) if transcripts.is_empty() => {
                reply(notifier, &chat, "No recent transcripts.").await;
            }
            Ok(transcripts) => {
                let lines: Vec<String> = transcripts
                    .iter()
                    .map(|t| {
                        format!("- {} (id: {})", t.title.as_deref().unwrap_or("(untitled)"), t.id)
                    })
                    .collect();
                reply(notifier, &chat, &lines.join("\n")).await;
            }
            Err(e) => reply(notifier, &chat, &format!("Lookup failed: {}", e)).await,
        },
        "/connect" => {
            if rest.is_empty() {
                reply(notifier, &chat, "Usage: /connect <transcript id>").await;
                return;
            }
            // One followed session per chat.
            if let Some(previous) = chats.remove(&chat_id) {
                previous.forwarder.abort();
                registry.stop_session(&previous.session_id).await;
            }

            reply(notifier, &chat, &format!("Connecting to call {}...", rest)).await;
            let (session_id, created) = registry
                .start_session(rest, SessionOptions::default())
                .await;
            if !created {
                reply(notifier, &chat, "Already following that call.").await;
            }

            if let Some(session) = registry.get(&session_id).await {
                let mut events = session.subscribe();
                let notifier = Arc::clone(notifier);
                let chat_clone = chat.clone();
                let forwarder = tokio::spawn(async move {
                    while let Ok(event) = events.recv().await {
                        let text = match event {
                            PushEvent::Hint(hint) => Some(hint.hint),
                            PushEvent::Status { status } => status_line(status),
                            PushEvent::Segment(_) => None,
                        };
                        if let Some(text) = text {
                            if let Err(e) = notifier.send_to(&chat_clone, &text).await {
                                warn!("Failed to forward to chat {}: {}", chat_clone, e);
                            }
                        }
                    }
                });
                chats.insert(
                    chat_id,
                    ChatSession {
                        session_id,
                        forwarder,
                    },
                );
            }
        }
        "/stop" => match chats.remove(&chat_id) {
            Some(active) => {
                active.forwarder.abort();
                registry.stop_session(&active.session_id).await;
                reply(notifier, &chat, "Stopped following the call.").await;
            }
            None => reply(notifier, &chat, "No active session.").await,
        },
        "/prep" => {
            reply(notifier, &chat, "Format: /prepdata <role>|<cv>|<jd>").await;
        }
        "/prepdata" => {
            let parts: Vec<&str> = rest.splitn(3, '|').collect();
            if parts.len() < 3 {
                reply(notifier, &chat, "Format: /prepdata <role>|<cv>|<jd>").await;
                return;
            }
            reply(notifier, &chat, "Generating prep brief...").await;
            match advisor
                .generate_prep_brief(parts[1].trim(), parts[2].trim(), parts[0].trim())
                .await
            {
                Ok(brief) => {
                    for chunk in split_message(&brief) {
                        reply(notifier, &chat, chunk).await;
                    }
                }
                Err(e) => reply(notifier, &chat, &format!("Prep brief failed: {}", e)).await,
            }
        }
        _ => {}
    }
}

fn status_line(status: ConnectionStatus) -> Option<String> {
    let line = match status {
        ConnectionStatus::Connecting => return None,
        ConnectionStatus::Connected => "Connection established...",
        ConnectionStatus::Authenticated => "Authenticated with the transcript provider.",
        ConnectionStatus::Listening => "Listening. Hints will arrive automatically.",
        ConnectionStatus::AuthFailed => "Provider auth failed. Check the API key.",
        ConnectionStatus::Disconnected => "Connection dropped.",
        ConnectionStatus::Error => "Connection error.",
    };
    Some(line.to_string())
}

fn split_message(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > MESSAGE_CHUNK {
        let mut cut = MESSAGE_CHUNK;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }
    chunks.push(rest);
    chunks
}

async fn reply(notifier: &Arc<Notifier>, chat_id: &str, text: &str) {
    if let Err(e) = notifier.send_to(chat_id, text).await {
        warn!("Failed to reply to chat {}: {}", chat_id, e);
    }
}
