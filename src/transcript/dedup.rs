use super::SegmentId;
use std::collections::HashMap;

/// Drops repeated chunks before they reach session state.
///
/// The provider re-broadcasts a chunk whenever its text is revised, and a
/// fallback race can briefly leave two adapters emitting the same data. A
/// chunk is only admitted when its identity is new or its text changed since
/// the last time that identity was seen.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashMap<SegmentId, String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the segment should be processed.
    pub fn admit(&mut self, id: &SegmentId, text: &str) -> bool {
        if self.seen.get(id).map(String::as_str) == Some(text) {
            return false;
        }
        self.seen.insert(id.clone(), text.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
