//! A single line received from a machine log stream.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The output channel a log line was written to on the remote machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stdout,
    Stderr,
}

impl Channel {
    /// Maps an SSE event name to a channel. Other event kinds are not log lines.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "stdout" => Some(Channel::Stdout),
            "stderr" => Some(Channel::Stderr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stdout => "stdout",
            Channel::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a single log line with its receipt time and channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// The raw text payload of the event.
    pub message: String,
    /// When the consumer received the event, not when the producer emitted it.
    pub timestamp: DateTime<Utc>,
    /// Which stream the line was written to.
    pub channel: Channel,
}
