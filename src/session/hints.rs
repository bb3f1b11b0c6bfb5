use super::buffer::{HintEvent, PushEvent};
use super::registry::Session;
use crate::advisory::Advisor;
use crate::notify::Notifier;
use crate::transcript::UtteranceSegment;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decide whether a new segment warrants an advisory call, and run it.
///
/// The gate (throttle clock + in-flight guard) and the prompt snapshot happen
/// under the session state lock; the advisory call itself runs outside it, so
/// new segments keep flowing while the slow path is on the wire. A failed or
/// empty attempt does not advance the throttle clock.
pub(crate) async fn maybe_hint(
    session: &Arc<Session>,
    advisor: &dyn Advisor,
    notifier: Option<&Arc<Notifier>>,
    segment: &UtteranceSegment,
) {
    let prompt = {
        let mut state = session.state.lock().await;
        if !state.try_begin_hint(!session.no_throttle) {
            return;
        }

        let recent_text = state.recent_lines().join("\n");
        if recent_text.len() < state.limits().min_context_chars {
            // An isolated short remark is not worth a hint.
            state.abandon_hint();
            return;
        }

        let mut prompt = String::new();
        if let Some(brief) = state.prep_brief() {
            prompt.push_str("Interview prep notes:\n");
            prompt.push_str(brief);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Recent conversation:\n");
        prompt.push_str(&recent_text);
        prompt.push_str(&format!(
            "\n\nNew remark: {}: {}\n\nDoes the recruiter need a hint right now? \
             If yes, write it. If not, reply with an empty string.",
            segment.speaker, segment.text
        ));
        prompt
    };

    let result = advisor.generate_hint(&prompt).await;

    let mut state = session.state.lock().await;

    // The session may have been stopped while the call was in flight; a late
    // result must not produce any side effect.
    if session.is_closed() {
        state.abandon_hint();
        return;
    }

    match result {
        Ok(Some(hint)) if hint.trim().len() > 2 => {
            let event = HintEvent {
                hint: hint.trim().to_string(),
                timestamp: Utc::now(),
            };
            state.commit_hint(event.clone());
            drop(state);

            info!("Session {} hint: {}", session.id, event.hint);
            session.publish(PushEvent::Hint(event.clone()));
            if let Some(notifier) = notifier {
                notifier.fire_and_forget(event.hint);
            }
        }
        Ok(_) => {
            state.abandon_hint();
            debug!("Advisor had nothing for session {}", session.id);
        }
        Err(e) => {
            state.abandon_hint();
            warn!("Hint generation failed for session {}: {}", session.id, e);
        }
    }
}
