//! Log buffer service
//!
//! Manages in-memory trace collection for job execution.
//! Entries are written during execution and periodically drained to be
//! sent to the orchestrator.

use gantry_core::domain::log::LogEntry;
use gantry_core::validation::{MAX_LOG_BATCH_SIZE, MAX_LOG_MESSAGE_LENGTH};
use std::sync::{Arc, Mutex};

/// Service for managing log buffers
pub trait LogBufferService: Send + Sync {
    /// Adds a log entry to the buffer
    fn add_entry(&self, entry: LogEntry);

    /// Removes and returns at most one batch of entries, oldest first
    fn drain_batch(&self) -> Vec<LogEntry>;

    fn is_empty(&self) -> bool;
}

/// In-memory implementation of LogBufferService
#[derive(Clone, Default)]
pub struct InMemoryLogBuffer {
    buffer: Arc<Mutex<Vec<LogEntry>>>,
}

impl InMemoryLogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogBufferService for InMemoryLogBuffer {
    /// Overlong messages are truncated to the orchestrator's limit
    fn add_entry(&self, mut entry: LogEntry) {
        if entry.message.len() > MAX_LOG_MESSAGE_LENGTH {
            let mut cut = MAX_LOG_MESSAGE_LENGTH;
            while !entry.message.is_char_boundary(cut) {
                cut -= 1;
            }
            entry.message.truncate(cut);
        }
        self.entries().push(entry);
    }

    fn drain_batch(&self) -> Vec<LogEntry> {
        let mut buffer = self.entries();
        let n = buffer.len().min(MAX_LOG_BATCH_SIZE);
        buffer.drain(..n).collect()
    }

    fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::log::LogLevel;

    #[test]
    fn test_drain_is_batched() {
        let buffer = InMemoryLogBuffer::new();
        for i in 0..(MAX_LOG_BATCH_SIZE + 5) {
            buffer.add_entry(LogEntry::now(LogLevel::Info, format!("line {}", i)));
        }

        assert_eq!(buffer.drain_batch().len(), MAX_LOG_BATCH_SIZE);
        let rest = buffer.drain_batch();
        assert_eq!(rest.len(), 5);
        assert_eq!(rest[0].message, format!("line {}", MAX_LOG_BATCH_SIZE));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_long_message_is_truncated() {
        let buffer = InMemoryLogBuffer::new();
        buffer.add_entry(LogEntry::now(LogLevel::Info, "é".repeat(MAX_LOG_MESSAGE_LENGTH)));

        let entry = buffer.drain_batch().remove(0);
        assert!(entry.message.len() <= MAX_LOG_MESSAGE_LENGTH);
    }
}
