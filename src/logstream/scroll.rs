//! Tracks whether the viewer wants to follow the newest log line.

/// Tolerance, in view units, when deciding whether the view is at the bottom.
pub const SCROLL_EPSILON: f64 = 1.0;

/// A scroll position report from the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollNotification {
    /// Distance from the top of the content to the top of the viewport.
    pub offset: f64,
    pub viewport_size: f64,
    pub content_size: f64,
    /// Set when the scroll was caused by an auto-scroll directive rather than the user.
    pub was_programmatic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPin {
    pinned: bool,
}

impl Default for ScrollPin {
    fn default() -> Self {
        Self { pinned: true }
    }
}

impl ScrollPin {
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Recomputes the pin from a user-driven scroll; programmatic scrolls are ignored.
    pub fn observe(&mut self, notification: ScrollNotification) -> bool {
        if !notification.was_programmatic {
            let bottom = notification.content_size - notification.viewport_size - SCROLL_EPSILON;
            self.pinned = notification.offset >= bottom;
        }
        self.pinned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(offset: f64) -> ScrollNotification {
        ScrollNotification {
            offset,
            viewport_size: 20.0,
            content_size: 100.0,
            was_programmatic: false,
        }
    }

    #[test]
    fn starts_pinned() {
        assert!(ScrollPin::default().is_pinned());
    }

    #[test]
    fn user_scroll_away_unpins_and_back_repins() {
        let mut pin = ScrollPin::default();
        assert!(!pin.observe(user(40.0)));
        assert!(pin.observe(user(80.0)));
        // Within epsilon of the bottom still counts.
        assert!(!pin.observe(user(50.0)));
        assert!(pin.observe(user(79.0)));
        assert!(!pin.observe(user(78.5)));
    }

    #[test]
    fn programmatic_scrolls_do_not_change_pin() {
        let mut pin = ScrollPin::default();
        pin.observe(user(10.0));
        let programmatic = ScrollNotification {
            was_programmatic: true,
            ..user(80.0)
        };
        assert!(!pin.observe(programmatic));
    }

    #[test]
    fn content_shorter_than_viewport_is_pinned() {
        let mut pin = ScrollPin::default();
        let short = ScrollNotification {
            offset: 0.0,
            viewport_size: 20.0,
            content_size: 5.0,
            was_programmatic: false,
        };
        assert!(pin.observe(short));
    }
}
