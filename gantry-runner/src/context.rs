//! Execution context for a single job
//!
//! Holds the trace buffer, the job's working directory and the
//! cancellation signal shared by the executor and the trace sender.

use gantry_core::domain::log::{LogEntry, LogLevel};
use gantry_core::dto::job::JobPayload;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use crate::service::{InMemoryLogBuffer, LogBufferService};

pub struct Context {
    pub payload: JobPayload,

    /// Working directory for the job's commands
    pub workspace: PathBuf,

    log_buffer: InMemoryLogBuffer,

    cancel_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new(payload: JobPayload, builds_dir: &std::path::Path) -> Arc<Self> {
        let workspace = builds_dir.join(payload.job_id.to_string());
        let (cancel_tx, _) = watch::channel(false);

        Arc::new(Self {
            payload,
            workspace,
            log_buffer: InMemoryLogBuffer::new(),
            cancel_tx,
        })
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.log_buffer.add_entry(LogEntry::now(level, message));
    }

    pub fn log_info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn log_warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn log_error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn drain_logs(&self) -> Vec<LogEntry> {
        self.log_buffer.drain_batch()
    }

    pub fn has_logs(&self) -> bool {
        !self.log_buffer.is_empty()
    }

    /// Ask the executor to stop the running command
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_canceled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    pub fn cancellation(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }
}
