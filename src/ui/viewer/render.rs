use anyhow::Result;
use chrono::Local;
use crossterm::{
    cursor, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io::{stdout, Write};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::logstream::{Channel, LogEntry, StreamState};

use super::LogViewer;

/// Renders one entry as a single terminal row.
pub fn format_line(entry: &LogEntry) -> String {
    let timestamp = entry.timestamp.with_timezone(&Local).format("%H:%M:%S");
    let message = entry.message.replace(['\r', '\n'], " ");
    format!("[{}] {}", timestamp, message)
}

/// Cuts `text` to at most `width` terminal columns.
pub fn fit_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    let mut used = 0;
    text.chars()
        .take_while(|c| {
            used += c.width().unwrap_or(0);
            used <= width
        })
        .collect()
}

fn channel_color(channel: Channel) -> Color {
    match channel {
        Channel::Stderr => Color::Red,
        Channel::Stdout => Color::Magenta,
    }
}

impl LogViewer {
    pub(super) fn render(&mut self) -> Result<()> {
        let mut stdout = stdout();
        let (width, height) = self.terminal_size;
        let width = width as usize;

        queue!(stdout, Clear(ClearType::All))?;

        for (row, entry) in self.view.visible().iter().enumerate() {
            queue!(
                stdout,
                cursor::MoveTo(0, row as u16),
                SetForegroundColor(channel_color(entry.channel)),
                Print(fit_width(&format_line(entry), width)),
                ResetColor
            )?;
        }

        if self.view.history.is_empty() && self.view.stream_state == StreamState::Streaming {
            queue!(
                stdout,
                cursor::MoveTo(0, 0),
                SetForegroundColor(Color::DarkGrey),
                Print("Waiting for logs..."),
                ResetColor
            )?;
        }

        self.render_status_line(&mut stdout, height.saturating_sub(1), width)?;
        stdout.flush()?;
        Ok(())
    }

    fn render_status_line(&self, stdout: &mut impl Write, row: u16, width: usize) -> Result<()> {
        let follow = if self.view.pinned { "following" } else { "scrolled" };
        let mut status = format!(
            " {} | {} | {} entries | {}",
            self.target,
            self.view.stream_state,
            self.view.history.len(),
            follow
        );
        if self.view.stream_state == StreamState::Closed {
            status.push_str(" | r: retry");
        }
        status.push_str(" | q: quit");
        if let Some(diagnostic) = &self.view.last_diagnostic {
            status.push_str(" | ");
            status.push_str(diagnostic);
        }

        let display = fit_width(&status, width);
        let padding = width.saturating_sub(UnicodeWidthStr::width(display.as_str()));
        let background = match self.view.stream_state {
            StreamState::Closed => Color::DarkRed,
            _ => Color::DarkGrey,
        };

        queue!(
            stdout,
            cursor::MoveTo(0, row),
            SetBackgroundColor(background),
            SetForegroundColor(Color::White),
            Print(display),
            Print(" ".repeat(padding)),
            ResetColor
        )?;
        Ok(())
    }
}
