//! View-side state of the log viewer, independent of the terminal.
use crate::logstream::{LogEntry, LogUpdate, ScrollNotification, StreamState};

/// A scroll request coming from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollKey {
    LineUp,
    LineDown,
    PageUp,
    PageDown,
    Top,
    Bottom,
}

pub struct ViewerState {
    pub history: Vec<LogEntry>,
    pub stream_state: StreamState,
    pub pinned: bool,
    pub last_diagnostic: Option<String>,
    /// Index of the first visible entry.
    top: usize,
    rows: usize,
}

impl ViewerState {
    pub fn new(rows: usize) -> Self {
        Self {
            history: Vec::new(),
            stream_state: StreamState::Idle,
            pinned: true,
            last_diagnostic: None,
            top: 0,
            rows: rows.max(1),
        }
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    fn max_top(&self) -> usize {
        self.history.len().saturating_sub(self.rows)
    }

    /// The entries in the visible window.
    pub fn visible(&self) -> &[LogEntry] {
        let end = (self.top + self.rows).min(self.history.len());
        &self.history[self.top.min(end)..end]
    }

    fn notification(&self, was_programmatic: bool) -> ScrollNotification {
        ScrollNotification {
            offset: self.top as f64,
            viewport_size: self.rows as f64,
            content_size: self.history.len() as f64,
            was_programmatic,
        }
    }

    /// Applies an update from the stream. Returns the scroll report the
    /// session must see when the update moved the viewport.
    pub fn apply(&mut self, update: LogUpdate) -> Option<ScrollNotification> {
        match update {
            LogUpdate::History(entries) => {
                self.history = entries;
                self.top = self.top.min(self.max_top());
                None
            }
            LogUpdate::ScrollTo(index) => {
                self.top = (index + 1).saturating_sub(self.rows).min(self.max_top());
                Some(self.notification(true))
            }
            LogUpdate::State(state) => {
                self.stream_state = state;
                None
            }
        }
    }

    /// Moves the viewport on behalf of the user.
    pub fn scroll(&mut self, key: ScrollKey) -> ScrollNotification {
        let page = self.rows.saturating_sub(1).max(1);
        self.top = match key {
            ScrollKey::LineUp => self.top.saturating_sub(1),
            ScrollKey::LineDown => self.top + 1,
            ScrollKey::PageUp => self.top.saturating_sub(page),
            ScrollKey::PageDown => self.top + page,
            ScrollKey::Top => 0,
            ScrollKey::Bottom => self.max_top(),
        }
        .min(self.max_top());
        self.notification(false)
    }

    /// Adjusts to a new terminal height, keeping the bottom in view when pinned.
    pub fn resize(&mut self, rows: usize) -> Option<ScrollNotification> {
        self.rows = rows.max(1);
        if self.pinned {
            self.top = self.max_top();
            Some(self.notification(true))
        } else {
            self.top = self.top.min(self.max_top());
            None
        }
    }
}
