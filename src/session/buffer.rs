use crate::transcript::{ConnectionStatus, UtteranceSegment};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Anything a delivery buffer can hold and filter by time.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// A hint emitted for a session.
#[derive(Debug, Clone, Serialize)]
pub struct HintEvent {
    pub hint: String,
    pub timestamp: DateTime<Utc>,
}

impl Timestamped for HintEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for UtteranceSegment {
    fn timestamp(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Event pushed to subscribed clients over the session's fan-out channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum PushEvent {
    Segment(UtteranceSegment),
    Hint(HintEvent),
    Status { status: ConnectionStatus },
}

/// Bounded FIFO of emitted events for short-poll consumers.
///
/// The oldest entry is evicted when the buffer is full. Readers either ask
/// for everything strictly after a watermark timestamp or for the last K
/// entries.
#[derive(Debug)]
pub struct DeliveryBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Timestamped + Clone> DeliveryBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Events strictly after the watermark, oldest first.
    pub fn since(&self, watermark: DateTime<Utc>) -> Vec<T> {
        self.items
            .iter()
            .filter(|item| item.timestamp() > watermark)
            .cloned()
            .collect()
    }

    /// The most recent `count` events, oldest first.
    pub fn last(&self, count: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(count);
        self.items.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
