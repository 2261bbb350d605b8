//! Async driver that connects a `LogStreamBuffer` to an event source and a flush timer.
use super::buffer::{Flushed, Generation, LogStreamBuffer, StreamState};
use super::{LogEntry, ScrollNotification};
use crate::error::StreamError;
use crate::sse::EventSource;
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default number of entries kept in the visible history.
pub const MAX_LOGS: usize = 1000;
/// Default delay between flushes of the pending batch.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(300);

/// Tunables for a stream session.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    pub max_logs: usize,
    pub flush_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_logs: MAX_LOGS,
            flush_interval: FLUSH_INTERVAL,
        }
    }
}

/// Updates published to the view layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LogUpdate {
    /// The full history after a change.
    History(Vec<LogEntry>),
    /// Scroll to this index; the view must report the resulting scroll as programmatic.
    ScrollTo(usize),
    State(StreamState),
}

struct ActiveStream {
    cancel: CancellationToken,
    receiver: JoinHandle<()>,
    flusher: JoinHandle<()>,
}

#[derive(Clone)]
struct Shared {
    buffer: Arc<Mutex<LogStreamBuffer>>,
    updates: mpsc::UnboundedSender<LogUpdate>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LogStreamBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes a flush result. Called with the buffer lock held so that
    /// nothing is published for a session after `stop` has returned.
    fn publish_flush(&self, buffer: &LogStreamBuffer, flushed: Flushed) {
        let _ = self
            .updates
            .send(LogUpdate::History(buffer.history().snapshot()));
        if let Some(index) = flushed.scroll_to {
            let _ = self.updates.send(LogUpdate::ScrollTo(index));
        }
    }

    fn fail(&self, generation: Generation, err: &StreamError) {
        let mut buffer = self.lock();
        if buffer.generation() != generation || buffer.state() != StreamState::Streaming {
            return;
        }
        error!("Log stream for {:?} failed: {}", buffer.target(), err);
        if let Some(flushed) = buffer.fail(generation) {
            self.publish_flush(&buffer, flushed);
        }
        let _ = self.updates.send(LogUpdate::State(StreamState::Closed));
    }
}

/// A live log stream for one target at a time.
///
/// Dropping the session stops it.
pub struct LogStreamSession {
    shared: Shared,
    source: Arc<dyn EventSource>,
    flush_interval: Duration,
    active: Option<ActiveStream>,
}

impl LogStreamSession {
    /// Creates an idle session and the receiver its updates are published on.
    pub fn new(
        source: Arc<dyn EventSource>,
        config: StreamConfig,
    ) -> (Self, mpsc::UnboundedReceiver<LogUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let session = Self {
            shared: Shared {
                buffer: Arc::new(Mutex::new(LogStreamBuffer::new(config.max_logs))),
                updates,
            },
            source,
            flush_interval: config.flush_interval,
            active: None,
        };
        (session, rx)
    }

    /// Starts streaming logs for `target`, stopping any previous session first.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::EmptyTarget` if `target` is blank; the current
    /// session is left untouched in that case. Connection failures are not
    /// returned here: they close the session and are published as
    /// `LogUpdate::State(StreamState::Closed)`.
    pub fn start(&mut self, target: &str) -> Result<(), StreamError> {
        if target.trim().is_empty() {
            return Err(StreamError::EmptyTarget);
        }
        self.stop();

        let generation = {
            let mut buffer = self.shared.lock();
            let generation = buffer.begin(target)?;
            let _ = self.shared.updates.send(LogUpdate::History(Vec::new()));
            let _ = self
                .shared
                .updates
                .send(LogUpdate::State(StreamState::Streaming));
            generation
        };

        info!("Streaming logs for {}", target);

        let cancel = CancellationToken::new();
        let receiver = tokio::spawn(receive_events(
            self.shared.clone(),
            self.source.clone(),
            target.to_string(),
            generation,
            cancel.clone(),
        ));
        let flusher = tokio::spawn(flush_periodically(
            self.shared.clone(),
            generation,
            self.flush_interval,
            cancel.clone(),
        ));

        self.active = Some(ActiveStream {
            cancel,
            receiver,
            flusher,
        });
        Ok(())
    }

    /// Closes the connection and cancels the flush timer.
    ///
    /// Idempotent; after it returns no further entries are recorded or published
    /// for the stopped session.
    pub fn stop(&mut self) {
        let was_streaming = {
            let mut buffer = self.shared.lock();
            let was_streaming = buffer.state() == StreamState::Streaming;
            buffer.stop();
            was_streaming
        };

        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.receiver.abort();
            active.flusher.abort();
        }

        if was_streaming {
            debug!("Log stream stopped");
            let _ = self.shared.updates.send(LogUpdate::State(StreamState::Idle));
        }
    }

    /// Forwards a scroll report from the view and returns whether it is pinned.
    pub fn observe_scroll(&self, notification: ScrollNotification) -> bool {
        self.shared.lock().observe_scroll(notification)
    }

    pub fn is_pinned(&self) -> bool {
        self.shared.lock().is_pinned()
    }

    pub fn state(&self) -> StreamState {
        self.shared.lock().state()
    }

    pub fn target(&self) -> Option<String> {
        self.shared.lock().target().map(str::to_string)
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.shared.lock().history().snapshot()
    }
}

impl Drop for LogStreamSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn receive_events(
    shared: Shared,
    source: Arc<dyn EventSource>,
    target: String,
    generation: Generation,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        connected = source.connect(&target) => connected,
    };

    let mut events = match connected {
        Ok(events) => events,
        Err(e) => {
            shared.fail(generation, &e);
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = events.next() => match next {
                Some(Ok(event)) => {
                    shared.lock().on_entry(generation, &event.event, event.data);
                }
                Some(Err(e)) => {
                    shared.fail(generation, &e);
                    break;
                }
                None => {
                    shared.fail(generation, &StreamError::Ended);
                    break;
                }
            }
        }
    }
}

async fn flush_periodically(
    shared: Shared,
    generation: Generation,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let mut buffer = shared.lock();
                if buffer.generation() != generation || buffer.state() != StreamState::Streaming {
                    break;
                }
                if let Some(flushed) = buffer.flush(generation) {
                    shared.publish_flush(&buffer, flushed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logstream::Channel;
    use crate::sse::{EventStream, SseEvent};
    use async_trait::async_trait;
    use futures::channel::mpsc as fmpsc;
    use std::collections::HashMap;

    type Feed = fmpsc::UnboundedSender<Result<SseEvent, StreamError>>;

    /// Hands out pre-registered in-memory streams by target id.
    #[derive(Default)]
    struct FakeSource {
        streams: Mutex<HashMap<String, fmpsc::UnboundedReceiver<Result<SseEvent, StreamError>>>>,
    }

    impl FakeSource {
        fn register(&self, target: &str) -> Feed {
            let (tx, rx) = fmpsc::unbounded();
            self.streams.lock().unwrap().insert(target.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl EventSource for FakeSource {
        async fn connect(&self, target: &str) -> Result<EventStream, StreamError> {
            match self.streams.lock().unwrap().remove(target) {
                Some(rx) => Ok(rx.boxed()),
                None => Err(StreamError::Status(404)),
            }
        }
    }

    fn line(kind: &str, data: &str) -> Result<SseEvent, StreamError> {
        Ok(SseEvent {
            event: kind.to_string(),
            data: data.to_string(),
        })
    }

    fn config(max_logs: usize) -> StreamConfig {
        StreamConfig {
            max_logs,
            flush_interval: Duration::from_millis(300),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<LogUpdate>) -> Vec<LogUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    fn history_messages(updates: &[LogUpdate]) -> Option<Vec<String>> {
        updates.iter().rev().find_map(|u| match u {
            LogUpdate::History(entries) => {
                Some(entries.iter().map(|e| e.message.clone()).collect())
            }
            _ => None,
        })
    }

    async fn tick() {
        tokio::time::sleep(Duration::from_millis(310)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn batches_events_until_the_flush_tick() {
        let source = Arc::new(FakeSource::default());
        let feed = source.register("m-1");
        let (mut session, mut rx) = LogStreamSession::new(source, config(1000));

        session.start("m-1").unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![
                LogUpdate::History(Vec::new()),
                LogUpdate::State(StreamState::Streaming)
            ]
        );

        for data in ["a", "b", "c"] {
            feed.unbounded_send(line("stdout", data)).unwrap();
        }
        tokio::task::yield_now().await;
        assert!(drain(&mut rx).is_empty(), "nothing is published between ticks");

        tick().await;
        let updates = drain(&mut rx);
        assert_eq!(
            history_messages(&updates),
            Some(vec!["a".into(), "b".into(), "c".into()])
        );
        assert!(updates.contains(&LogUpdate::ScrollTo(2)));
        assert!(session
            .snapshot()
            .iter()
            .all(|e| e.channel == Channel::Stdout));

        // Empty ticks publish nothing.
        tick().await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unpinned_viewer_gets_no_scroll_directive() {
        let source = Arc::new(FakeSource::default());
        let feed = source.register("m-1");
        let (mut session, mut rx) = LogStreamSession::new(source, config(1000));
        session.start("m-1").unwrap();

        session.observe_scroll(ScrollNotification {
            offset: 0.0,
            viewport_size: 10.0,
            content_size: 50.0,
            was_programmatic: false,
        });
        assert!(!session.is_pinned());

        feed.unbounded_send(line("stderr", "boom")).unwrap();
        tick().await;
        let updates = drain(&mut rx);
        assert_eq!(history_messages(&updates), Some(vec!["boom".into()]));
        assert!(!updates.iter().any(|u| matches!(u, LogUpdate::ScrollTo(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_error_closes_and_freezes_history() {
        let source = Arc::new(FakeSource::default());
        let feed = source.register("m-1");
        let (mut session, mut rx) = LogStreamSession::new(source, config(1000));
        session.start("m-1").unwrap();

        feed.unbounded_send(line("stdout", "a")).unwrap();
        tick().await;
        feed.unbounded_send(Err(StreamError::Connection("reset".into())))
            .unwrap();
        feed.unbounded_send(line("stdout", "after error")).unwrap();
        tick().await;
        tick().await;

        assert_eq!(session.state(), StreamState::Closed);
        let updates = drain(&mut rx);
        assert!(updates.contains(&LogUpdate::State(StreamState::Closed)));
        let messages: Vec<String> = session.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_closes_the_session() {
        let source = Arc::new(FakeSource::default());
        let (mut session, mut rx) = LogStreamSession::new(source, config(1000));
        session.start("missing").unwrap();
        tick().await;
        assert_eq!(session.state(), StreamState::Closed);
        assert!(drain(&mut rx).contains(&LogUpdate::State(StreamState::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_silences_the_session() {
        let source = Arc::new(FakeSource::default());
        let feed = source.register("m-1");
        let (mut session, mut rx) = LogStreamSession::new(source, config(1000));
        session.start("m-1").unwrap();
        feed.unbounded_send(line("stdout", "a")).unwrap();
        tick().await;
        drain(&mut rx);

        feed.unbounded_send(line("stdout", "never shown")).unwrap();
        session.stop();
        session.stop();

        tick().await;
        let updates = drain(&mut rx);
        assert_eq!(updates, vec![LogUpdate::State(StreamState::Idle)]);
        assert_eq!(session.state(), StreamState::Idle);
        let messages: Vec<String> = session.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_targets_never_mixes_sessions() {
        let source = Arc::new(FakeSource::default());
        let first = source.register("m-1");
        let second = source.register("m-2");
        let (mut session, mut rx) = LogStreamSession::new(source, config(1000));

        session.start("m-1").unwrap();
        first.unbounded_send(line("stdout", "one")).unwrap();
        tokio::task::yield_now().await;

        session.start("m-2").unwrap();
        first.unbounded_send(line("stdout", "stale")).unwrap();
        second.unbounded_send(line("stdout", "two")).unwrap();
        tick().await;

        let updates = drain(&mut rx);
        assert_eq!(history_messages(&updates), Some(vec!["two".into()]));
        assert_eq!(session.target().as_deref(), Some("m-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_applies_across_flushes() {
        let source = Arc::new(FakeSource::default());
        let feed = source.register("m-1");
        let (mut session, _rx) = LogStreamSession::new(source, config(3));
        session.start("m-1").unwrap();

        for data in ["a", "b"] {
            feed.unbounded_send(line("stdout", data)).unwrap();
        }
        tick().await;
        for data in ["c", "d"] {
            feed.unbounded_send(line("stdout", data)).unwrap();
        }
        tick().await;

        let messages: Vec<String> = session.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn empty_target_is_rejected() {
        let source = Arc::new(FakeSource::default());
        let (mut session, _rx) = LogStreamSession::new(source, StreamConfig::default());
        assert_eq!(session.start(""), Err(StreamError::EmptyTarget));
        assert_eq!(session.state(), StreamState::Idle);
    }
}
