//! The synchronous core of a log stream session.
//!
//! `LogStreamBuffer` owns the pending batch, the bounded history and the
//! scroll pin. It performs no I/O: the async driver in `session` feeds it
//! events and flush ticks, and publishes whatever it returns.
use super::{LogEntry, LogHistory, ScrollNotification, ScrollPin};
use crate::error::StreamError;
use crate::logstream::Channel;
use chrono::{DateTime, Utc};
use std::fmt;

/// Lifecycle of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No target bound, or the session was stopped.
    Idle,
    /// Connected (or connecting) and accepting events.
    Streaming,
    /// The connection faulted; the last history stays readable.
    Closed,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StreamState::Idle => "idle",
            StreamState::Streaming => "streaming",
            StreamState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Identifies the session an event or tick belongs to.
///
/// Every `begin` and `stop` advances the generation, so work tagged with an
/// older one is discarded.
pub type Generation = u64;

/// Result of a flush that changed the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flushed {
    /// Number of entries moved out of the pending batch.
    pub appended: usize,
    /// Index to scroll to when the viewer is pinned to the bottom.
    pub scroll_to: Option<usize>,
}

pub struct LogStreamBuffer {
    history: LogHistory,
    pending: Vec<LogEntry>,
    scroll: ScrollPin,
    state: StreamState,
    target: Option<String>,
    generation: Generation,
    last_timestamp: Option<DateTime<Utc>>,
}

impl LogStreamBuffer {
    /// Creates an idle `LogStreamBuffer`.
    ///
    /// # Arguments
    ///
    /// * `max_logs` - The number of entries the history retains; older
    ///   entries are evicted first.
    pub fn new(max_logs: usize) -> Self {
        Self {
            history: LogHistory::new(max_logs),
            pending: Vec::new(),
            scroll: ScrollPin::default(),
            state: StreamState::Idle,
            target: None,
            generation: 0,
            last_timestamp: None,
        }
    }

    /// Binds a new target and enters `Streaming` with an empty history.
    ///
    /// Any previous session is stopped first.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::EmptyTarget` without touching the current session
    /// when `target` is blank.
    pub fn begin(&mut self, target: &str) -> Result<Generation, StreamError> {
        if target.trim().is_empty() {
            return Err(StreamError::EmptyTarget);
        }

        self.stop();
        self.history.clear();
        self.scroll = ScrollPin::default();
        self.last_timestamp = None;
        self.target = Some(target.to_string());
        self.state = StreamState::Streaming;
        Ok(self.generation)
    }

    /// Records one received event, stamped with the current time.
    pub fn on_entry(&mut self, generation: Generation, event: &str, message: String) -> bool {
        self.receive(generation, event, message, Utc::now())
    }

    /// Records one received event, stamped with `received_at`.
    ///
    /// Returns `false` when the event was ignored: it belongs to another
    /// session, the session is not streaming, or the event kind is not a log
    /// channel. Timestamps never go backwards within a session.
    pub fn receive(
        &mut self,
        generation: Generation,
        event: &str,
        message: String,
        received_at: DateTime<Utc>,
    ) -> bool {
        if !self.accepts(generation) {
            return false;
        }
        let Some(channel) = Channel::from_event_name(event) else {
            return false;
        };

        let timestamp = match self.last_timestamp {
            Some(last) if last > received_at => last,
            _ => received_at,
        };
        self.last_timestamp = Some(timestamp);
        self.pending.push(LogEntry {
            message,
            timestamp,
            channel,
        });
        true
    }

    /// Moves the pending batch into the history.
    ///
    /// Returns `None` (nothing to publish) when the tick is stale or nothing
    /// is pending.
    pub fn flush(&mut self, generation: Generation) -> Option<Flushed> {
        if !self.accepts(generation) {
            return None;
        }
        self.flush_pending()
    }

    /// Ends the session after a stream fault.
    ///
    /// Entries received before the fault are flushed once more, then the
    /// history is frozen in `Closed`.
    pub fn fail(&mut self, generation: Generation) -> Option<Flushed> {
        if !self.accepts(generation) {
            return None;
        }
        let flushed = self.flush_pending();
        self.state = StreamState::Closed;
        flushed
    }

    /// Stops accepting events and ticks. Safe to call in any state, any number of times.
    ///
    /// Pending entries are discarded; the history stays readable until the next `begin`.
    pub fn stop(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pending.clear();
        if self.state == StreamState::Streaming {
            self.state = StreamState::Idle;
        }
    }

    /// Applies a scroll report from the rendering layer and returns the new pin.
    pub fn observe_scroll(&mut self, notification: ScrollNotification) -> bool {
        self.scroll.observe(notification)
    }

    pub fn is_pinned(&self) -> bool {
        self.scroll.is_pinned()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn history(&self) -> &LogHistory {
        &self.history
    }

    pub fn pending(&self) -> &[LogEntry] {
        &self.pending
    }

    fn accepts(&self, generation: Generation) -> bool {
        generation == self.generation && self.state == StreamState::Streaming
    }

    fn flush_pending(&mut self) -> Option<Flushed> {
        if self.pending.is_empty() {
            return None;
        }

        let appended = self.pending.len();
        self.history.append_batch(self.pending.drain(..));

        let scroll_to = if self.scroll.is_pinned() {
            self.history.last_index()
        } else {
            None
        };

        Some(Flushed {
            appended,
            scroll_to,
        })
    }
}
