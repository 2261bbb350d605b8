use anyhow::Result;
use crossterm::{
    cursor, execute,
    terminal::{self},
};
use std::io::stdout;

use super::LogViewer;

impl LogViewer {
    pub(super) fn initialize_terminal(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;
        self.terminal_active = true;

        let (width, height) = terminal::size()?;
        self.terminal_size = (width, height);
        self.resize(width, height);

        if let Some(diagnostics) = &self.diagnostics {
            self.diagnostics_rx = Some(diagnostics.attach());
        }
        Ok(())
    }

    pub fn cleanup(&mut self) -> Result<()> {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.detach();
        }
        if !self.terminal_active {
            return Ok(());
        }
        self.terminal_active = false;
        terminal::disable_raw_mode()?;
        execute!(stdout(), cursor::Show, terminal::LeaveAlternateScreen)?;
        Ok(())
    }
}

impl Drop for LogViewer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
