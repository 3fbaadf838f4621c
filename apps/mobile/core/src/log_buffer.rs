//! Bounded, append-only protocol log shown in the app's diagnostics screen.
//!
//! Every protocol client owns one. Entries are mirrored to the `log` facade so
//! they also end up in `RUST_LOG` output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::ignore_poison::IgnorePoison;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LogDirection {
    Info,
    /// Something we put on the wire.
    Sent,
    /// Something the camera put on the wire.
    Received,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub direction: LogDirection,
    pub message: String,
}

impl LogEntry {
    pub fn new(direction: LogDirection, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            direction,
            message: message.into(),
        }
    }
}

/// Ring buffer of log entries. Cloning shares the same buffer.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    /// Tag used for the mirrored `log` records ("ptp", "dlna", ...).
    source: &'static str,
    capacity: usize,
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl LogBuffer {
    pub fn new(source: &'static str, capacity: usize) -> Self {
        Self {
            source,
            capacity: capacity.max(1),
            entries: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Appends an entry, evicting the oldest when full. Returns the stored entry.
    pub fn push(&self, direction: LogDirection, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(direction, message);
        match direction {
            LogDirection::Error => log::warn!("[{}] {}", self.source, entry.message),
            LogDirection::Info => log::info!("[{}] {}", self.source, entry.message),
            LogDirection::Sent => log::debug!("[{}] >> {}", self.source, entry.message),
            LogDirection::Received => log::debug!("[{}] << {}", self.source, entry.message),
        }

        let mut entries = self.entries.lock_ignore_poison();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        entry
    }

    pub fn info(&self, message: impl Into<String>) -> LogEntry {
        self.push(LogDirection::Info, message)
    }

    pub fn sent(&self, message: impl Into<String>) -> LogEntry {
        self.push(LogDirection::Sent, message)
    }

    pub fn received(&self, message: impl Into<String>) -> LogEntry {
        self.push(LogDirection::Received, message)
    }

    pub fn error(&self, message: impl Into<String>) -> LogEntry {
        self.push(LogDirection::Error, message)
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock_ignore_poison().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock_ignore_poison().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock_ignore_poison().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_entries_are_evicted() {
        let buffer = LogBuffer::new("test", 3);
        for i in 0..5 {
            buffer.info(format!("entry {i}"));
        }
        let messages: Vec<String> = buffer.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = LogBuffer::new("test", 10);
        let clone = buffer.clone();
        clone.sent("hello");
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.snapshot()[0].direction, LogDirection::Sent);
        buffer.clear();
        assert!(clone.is_empty());
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let buffer = LogBuffer::new("test", 0);
        buffer.error("a");
        buffer.error("b");
        assert_eq!(buffer.snapshot().len(), 1);
        assert_eq!(buffer.snapshot()[0].message, "b");
    }
}
