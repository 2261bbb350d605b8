//! Live machine log consumption.
//!
//! Remote `stdout`/`stderr` events are buffered as they arrive and moved into
//! a bounded history on a fixed flush cadence, so bursts of output cost one
//! view update per tick rather than one per line.
pub mod buffer;
pub mod entry;
pub mod history;
pub mod scroll;
pub mod session;

pub use buffer::{LogStreamBuffer, StreamState};
pub use entry::{Channel, LogEntry};
pub use history::LogHistory;
pub use scroll::{ScrollNotification, ScrollPin};
pub use session::{LogStreamSession, LogUpdate, StreamConfig, FLUSH_INTERVAL, MAX_LOGS};
