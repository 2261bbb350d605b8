//! Bounded, arrival-ordered log history.
use super::LogEntry;
use std::collections::VecDeque;

/// The visible log history of one stream session.
///
/// Holds at most `capacity` entries; appending past that evicts the oldest.
#[derive(Debug, Clone)]
pub struct LogHistory {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a batch in order, dropping from the front to stay within capacity.
    pub fn append_batch(&mut self, batch: impl IntoIterator<Item = LogEntry>) {
        for entry in batch {
            self.entries.push_back(entry);
            while self.entries.len() > self.capacity {
                self.entries.pop_front();
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&LogEntry> {
        self.entries.get(index)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.entries.len().checked_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logstream::Channel;
    use chrono::Utc;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            message: message.to_string(),
            timestamp: Utc::now(),
            channel: Channel::Stdout,
        }
    }

    fn messages(history: &LogHistory) -> Vec<&str> {
        history.iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn keeps_most_recent_entries_in_order() {
        let mut history = LogHistory::new(3);
        history.append_batch(vec![entry("a"), entry("b")]);
        history.append_batch(vec![entry("c"), entry("d")]);
        assert_eq!(messages(&history), vec!["b", "c", "d"]);
        assert_eq!(history.last_index(), Some(2));
    }

    #[test]
    fn single_batch_larger_than_capacity() {
        let mut history = LogHistory::new(2);
        history.append_batch(["1", "2", "3", "4", "5"].map(entry));
        assert_eq!(messages(&history), vec!["4", "5"]);
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let mut history = LogHistory::new(0);
        history.append_batch(vec![entry("a")]);
        assert!(history.is_empty());
        assert_eq!(history.last_index(), None);
    }
}
