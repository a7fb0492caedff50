//! Bounded message history — observability only, never load-bearing.

use std::collections::VecDeque;

use liaison_protocol::Message;

/// Default ring capacity.
pub const HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub direction: Direction,
    pub message: Message,
}

/// Fixed-capacity ring of recent traffic, oldest entries evicted first.
#[derive(Debug)]
pub struct MessageHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl MessageHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, direction: Direction, message: &Message) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            direction,
            message: message.clone(),
        });
    }

    /// Oldest-first copy of the current entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
