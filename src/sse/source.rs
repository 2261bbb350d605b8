//! Event sources for machine log streams.
use super::{SseDecoder, SseEvent};
use crate::error::StreamError;
use crate::http::endpoint;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Url;
use std::collections::VecDeque;
use tracing::debug;

/// A stream of decoded events; an `Err` item is terminal.
pub type EventStream = BoxStream<'static, Result<SseEvent, StreamError>>;

/// Opens a push stream of log events for a target.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Connects to the log stream of `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// endpoint rejects it.
    async fn connect(&self, target: &str) -> Result<EventStream, StreamError>;
}

/// Streams logs from `{base}/machine-logs/{target}` over HTTP.
pub struct HttpEventSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpEventSource {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn stream_url(&self, target: &str) -> Result<Url, StreamError> {
        endpoint(&self.base_url, &["machine-logs", target]).map_err(StreamError::InvalidEndpoint)
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn connect(&self, target: &str) -> Result<EventStream, StreamError> {
        let url = self.stream_url(target)?;
        debug!("Connecting to log stream {}", url);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| StreamError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StreamError::Connection(e.to_string())));
        Ok(decode_stream(bytes).boxed())
    }
}

struct DecodeState<S> {
    stream: S,
    decoder: SseDecoder,
    ready: VecDeque<SseEvent>,
    done: bool,
}

/// Decodes a byte stream into SSE events.
///
/// The first transport error is yielded and ends the stream.
pub fn decode_stream<S>(byte_stream: S) -> impl Stream<Item = Result<SseEvent, StreamError>>
where
    S: Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
{
    let state = DecodeState {
        stream: byte_stream.boxed(),
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.ready.pop_front() {
                return Some((Ok(event), st));
            }
            if st.done {
                return None;
            }

            match st.stream.next().await {
                Some(Ok(chunk)) => {
                    let events = st.decoder.feed(&chunk);
                    st.ready.extend(events);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    let events = st.decoder.finish();
                    st.ready.extend(events);
                }
            }
        }
    })
}
