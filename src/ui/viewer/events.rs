use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::logstream::{LogUpdate, StreamState};

use super::state::ScrollKey;
use super::LogViewer;

/// Terminal input relevant to the viewer.
#[derive(Debug)]
pub enum ViewerEvent {
    Key(KeyEvent),
    Resize(u16, u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// What a key press asks the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Scroll(ScrollKey),
    Retry,
    Quit,
    Ignore,
}

pub fn key_action(key: KeyEvent) -> KeyAction {
    match (key.code, key.modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => KeyAction::Quit,
        (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => KeyAction::Quit,
        (KeyCode::Char('r'), _) => KeyAction::Retry,
        (KeyCode::Up, _) | (KeyCode::Char('k'), _) => KeyAction::Scroll(ScrollKey::LineUp),
        (KeyCode::Down, _) | (KeyCode::Char('j'), _) => KeyAction::Scroll(ScrollKey::LineDown),
        (KeyCode::PageUp, _) => KeyAction::Scroll(ScrollKey::PageUp),
        (KeyCode::PageDown, _) => KeyAction::Scroll(ScrollKey::PageDown),
        (KeyCode::Home, _) | (KeyCode::Char('g'), _) => KeyAction::Scroll(ScrollKey::Top),
        (KeyCode::End, _) | (KeyCode::Char('G'), _) => KeyAction::Scroll(ScrollKey::Bottom),
        _ => KeyAction::Ignore,
    }
}

/// Polls the terminal on a blocking thread until `cancel` fires.
pub fn spawn_input_reader(
    tx: mpsc::UnboundedSender<ViewerEvent>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !cancel.is_cancelled() {
            if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
                continue;
            }
            let forwarded = match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                    tx.send(ViewerEvent::Key(key))
                }
                Ok(Event::Resize(width, height)) => tx.send(ViewerEvent::Resize(width, height)),
                Ok(_) => Ok(()),
                Err(e) => {
                    debug!("Failed to read terminal event: {}", e);
                    Ok(())
                }
            };
            if forwarded.is_err() {
                break;
            }
        }
    })
}

impl LogViewer {
    pub(super) fn handle_event(&mut self, event: ViewerEvent) -> Result<Flow> {
        match event {
            ViewerEvent::Key(key) => self.handle_key(key),
            ViewerEvent::Resize(width, height) => {
                self.terminal_size = (width, height);
                self.resize(width, height);
                Ok(Flow::Continue)
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<Flow> {
        match key_action(key) {
            KeyAction::Quit => return Ok(Flow::Exit),
            KeyAction::Scroll(scroll) => {
                let report = self.view.scroll(scroll);
                self.view.pinned = self.session.observe_scroll(report);
            }
            KeyAction::Retry => {
                if self.view.stream_state == StreamState::Streaming {
                    return Ok(Flow::Continue);
                }
                self.view.last_diagnostic = None;
                if let Err(e) = self.session.start(&self.target) {
                    warn!("Unable to restart log stream: {}", e);
                }
            }
            KeyAction::Ignore => {}
        }
        Ok(Flow::Continue)
    }

    pub(super) fn handle_update(&mut self, update: LogUpdate) {
        if let Some(report) = self.view.apply(update) {
            self.view.pinned = self.session.observe_scroll(report);
        }
    }

    pub(super) fn resize(&mut self, _width: u16, height: u16) {
        let rows = height.saturating_sub(1).max(1) as usize;
        if let Some(report) = self.view.resize(rows) {
            self.view.pinned = self.session.observe_scroll(report);
        }
    }
}
