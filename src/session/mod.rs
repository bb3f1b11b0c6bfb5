//! Session management
//!
//! A session ties one monitored transcript to its supervised connection,
//! sliding context window, throttled hint generation, and bounded delivery
//! buffers. The registry owns the id -> session mapping and is its only
//! mutator.

mod buffer;
mod hints;
mod registry;
mod state;

pub use buffer::{DeliveryBuffer, HintEvent, PushEvent, Timestamped};
pub use registry::{BufferReadout, Session, SessionOptions, SessionRegistry};
pub use state::{SessionLimits, SessionState};
