//! Bounded in-memory log capture for crash reports

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use log::Record;
use serde::{Deserialize, Serialize};

use crate::foundation::logging::LogSink;

/// One captured log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Local time, `YYYY-MM-DDTHH:MM:SS`
    pub timestamp: String,
    /// Level name, e.g. `WARN`
    pub level: String,
    /// Formatted message
    pub message: String,
}

/// Keeps the most recent `capacity` log entries; older ones fall off the front
#[derive(Debug)]
pub struct RingBufferSink {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl RingBufferSink {
    /// Empty sink holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Maximum retained entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, evicting the oldest when full
    pub fn push(&self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Copy of the retained entries, oldest first
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when nothing is retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl LogSink for RingBufferSink {
    fn log(&self, record: &Record) {
        self.push(LogEntry {
            timestamp: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            level: record.level().to_string(),
            message: record.args().to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            timestamp: "2026-01-01T00:00:00".to_string(),
            level: "INFO".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_keeps_most_recent_entries() {
        let sink = RingBufferSink::new(3);
        for i in 0..5 {
            sink.push(entry(&format!("line {}", i)));
        }
        let messages: Vec<String> = sink.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let sink = RingBufferSink::new(0);
        sink.push(entry("dropped"));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_record_fields() {
        let sink = RingBufferSink::new(4);
        sink.log(
            &Record::builder()
                .args(format_args!("disk nearly full"))
                .level(log::Level::Warn)
                .build(),
        );
        let captured = sink.snapshot();
        assert_eq!(captured[0].level, "WARN");
        assert_eq!(captured[0].message, "disk nearly full");
        assert_eq!(captured[0].timestamp.len(), 19);
        sink.clear();
        assert_eq!(sink.len(), 0);
    }
}
