use super::buffer::{DeliveryBuffer, HintEvent};
use crate::transcript::UtteranceSegment;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Capacity and throttle knobs for a session, overridable for tests.
#[derive(Debug, Clone)]
pub struct SessionLimits {
    /// Sliding context window fed to the advisory service
    pub context_window: usize,

    /// How many window entries go into one advisory prompt
    pub hint_context: usize,

    /// Minimum joined length of recent text before an advisory call is worth it
    pub min_context_chars: usize,

    /// Delivery buffer capacities
    pub segment_buffer: usize,
    pub hint_buffer: usize,

    /// Minimum spacing between hints for one session
    pub min_hint_interval: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            context_window: 50,
            hint_context: 10,
            min_context_chars: 30,
            segment_buffer: 50,
            hint_buffer: 20,
            min_hint_interval: Duration::from_secs(20),
        }
    }
}

/// Mutable per-session state: context window, throttle clock, delivery
/// buffers. Held behind one mutex so segment processing for a session never
/// interleaves its read-modify-write of the throttle clock.
pub struct SessionState {
    context: VecDeque<UtteranceSegment>,
    prep_brief: Option<String>,
    last_hint_at: Option<Instant>,
    hint_in_flight: bool,
    hint_count: u64,
    pub segments: DeliveryBuffer<UtteranceSegment>,
    pub hints: DeliveryBuffer<HintEvent>,
    limits: SessionLimits,
}

impl SessionState {
    pub fn new(limits: SessionLimits, prep_brief: Option<String>) -> Self {
        Self {
            context: VecDeque::with_capacity(limits.context_window),
            prep_brief,
            last_hint_at: None,
            hint_in_flight: false,
            hint_count: 0,
            segments: DeliveryBuffer::new(limits.segment_buffer),
            hints: DeliveryBuffer::new(limits.hint_buffer),
            limits,
        }
    }

    /// Append a deduplicated segment to the context window and the segment
    /// delivery buffer. Oldest window entry drops on overflow.
    pub fn record_segment(&mut self, segment: UtteranceSegment) {
        if self.context.len() == self.limits.context_window {
            self.context.pop_front();
        }
        self.context.push_back(segment.clone());
        self.segments.push(segment);
    }

    /// The last few window entries formatted as `speaker: text` lines.
    pub fn recent_lines(&self) -> Vec<String> {
        let skip = self.context.len().saturating_sub(self.limits.hint_context);
        self.context
            .iter()
            .skip(skip)
            .map(|s| format!("{}: {}", s.speaker, s.text))
            .collect()
    }

    pub fn context_len(&self) -> usize {
        self.context.len()
    }

    pub fn prep_brief(&self) -> Option<&str> {
        self.prep_brief.as_deref()
    }

    pub fn set_prep_brief(&mut self, brief: Option<String>) {
        self.prep_brief = brief;
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    pub fn hint_count(&self) -> u64 {
        self.hint_count
    }

    /// Throttle gate + in-flight guard, decided atomically under the state
    /// lock. Returns false when a hint attempt must not be dispatched now.
    pub fn try_begin_hint(&mut self, throttled: bool) -> bool {
        if self.hint_in_flight {
            return false;
        }
        if throttled {
            if let Some(last) = self.last_hint_at {
                if last.elapsed() < self.limits.min_hint_interval {
                    return false;
                }
            }
        }
        self.hint_in_flight = true;
        true
    }

    /// A dispatched attempt finished without producing a hint. The throttle
    /// clock does not advance, so the next qualifying segment may retry
    /// immediately.
    pub fn abandon_hint(&mut self) {
        self.hint_in_flight = false;
    }

    /// Record a delivered hint: advance the throttle clock, bump the counter,
    /// buffer the event.
    pub fn commit_hint(&mut self, event: HintEvent) {
        self.hint_in_flight = false;
        self.last_hint_at = Some(Instant::now());
        self.hint_count += 1;
        self.hints.push(event);
    }
}
