//! Full-screen terminal viewer for a machine's live logs.
mod events;
mod lifecycle;
mod render;
mod state;

use state::ViewerState;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::logging::DiagnosticsHandle;
use crate::logstream::{LogStreamSession, LogUpdate};

use events::{spawn_input_reader, Flow, ViewerEvent};

pub struct LogViewer {
    session: LogStreamSession,
    updates: mpsc::UnboundedReceiver<LogUpdate>,
    target: String,
    view: ViewerState,
    terminal_size: (u16, u16),
    terminal_active: bool,
    diagnostics: Option<DiagnosticsHandle>,
    diagnostics_rx: Option<mpsc::UnboundedReceiver<String>>,
}

impl LogViewer {
    pub fn new(
        session: LogStreamSession,
        updates: mpsc::UnboundedReceiver<LogUpdate>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            session,
            updates,
            target: target.into(),
            view: ViewerState::new(1),
            terminal_size: (80, 24),
            terminal_active: false,
            diagnostics: None,
            diagnostics_rx: None,
        }
    }

    /// Shows warnings and errors in the status bar while the viewer runs.
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsHandle) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Streams the target's logs until the user quits.
    pub async fn run(mut self) -> Result<()> {
        self.session
            .start(&self.target)
            .with_context(|| format!("Cannot stream logs for '{}'", self.target))?;
        self.initialize_terminal()?;

        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let reader = spawn_input_reader(input_tx, cancel.clone());

        debug!("Starting log viewer loop");
        let outcome = self.event_loop(&mut input_rx).await;

        cancel.cancel();
        let _ = reader.await;
        self.session.stop();
        self.cleanup()?;
        outcome
    }

    async fn event_loop(
        &mut self,
        input_rx: &mut mpsc::UnboundedReceiver<ViewerEvent>,
    ) -> Result<()> {
        self.render()?;
        loop {
            tokio::select! {
                event = input_rx.recv() => {
                    let Some(event) = event else { break };
                    match self.handle_event(event) {
                        Ok(Flow::Exit) => break,
                        Ok(Flow::Continue) => {}
                        Err(e) => error!("Error handling terminal event: {}", e),
                    }
                }
                Some(update) = self.updates.recv() => self.handle_update(update),
                Some(line) = next_diagnostic(&mut self.diagnostics_rx) => {
                    self.view.last_diagnostic = Some(line);
                }
            }
            self.render()?;
        }
        Ok(())
    }
}

async fn next_diagnostic(rx: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use crate::logstream::{StreamConfig, StreamState};
    use crate::sse::{EventSource, EventStream};
    use async_trait::async_trait;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::sync::Arc;

    struct Refusing;

    #[async_trait]
    impl EventSource for Refusing {
        async fn connect(&self, _target: &str) -> Result<EventStream, StreamError> {
            Err(StreamError::Status(502))
        }
    }

    async fn drain_until(viewer: &mut LogViewer, wanted: StreamState) {
        loop {
            let update = viewer.updates.recv().await.unwrap();
            let reached = update == LogUpdate::State(wanted);
            viewer.handle_update(update);
            if reached {
                break;
            }
        }
    }

    #[tokio::test]
    async fn retry_key_restarts_a_closed_stream() {
        let (session, updates) = LogStreamSession::new(Arc::new(Refusing), StreamConfig::default());
        let mut viewer = LogViewer::new(session, updates, "machine-1");
        viewer.session.start("machine-1").unwrap();
        drain_until(&mut viewer, StreamState::Closed).await;
        assert_eq!(viewer.view.stream_state, StreamState::Closed);

        let retry = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE);
        assert_eq!(viewer.handle_event(ViewerEvent::Key(retry)).unwrap(), Flow::Continue);
        drain_until(&mut viewer, StreamState::Streaming).await;
        assert_eq!(viewer.view.stream_state, StreamState::Streaming);
        drain_until(&mut viewer, StreamState::Closed).await;
    }

    #[tokio::test]
    async fn quit_keys_end_the_loop() {
        let (session, updates) = LogStreamSession::new(Arc::new(Refusing), StreamConfig::default());
        let mut viewer = LogViewer::new(session, updates, "machine-1");
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(viewer.handle_event(ViewerEvent::Key(ctrl_c)).unwrap(), Flow::Exit);
    }
}
