//! Service layer
//!
//! Services contain the runner's business logic: script execution, trace
//! buffering and tag discovery.

mod capabilities;
mod execution;
mod log_buffer;

// Re-export traits
pub use capabilities::CapabilitiesService;
pub use execution::ExecutionService;
pub use log_buffer::LogBufferService;

// Re-export implementations
pub use capabilities::StandardCapabilitiesService;
pub use execution::{ExecutionOutcome, ShellExecutionService};
pub use log_buffer::InMemoryLogBuffer;
