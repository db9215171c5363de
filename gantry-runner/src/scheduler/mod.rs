//! Scheduler layer for the runner
//!
//! Requests jobs from the orchestrator and manages each one from claim to
//! completion.

pub mod poller;

pub use poller::JobPoller;
