//! Server-Sent-Events consumption for machine log streams.
mod decoder;
mod source;

pub use decoder::{SseDecoder, SseEvent};
pub use source::{decode_stream, EventSource, EventStream, HttpEventSource};
