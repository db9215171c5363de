//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs used for communication between Gantry services
//! (orchestrator, runner, CLI). DTOs are lightweight representations of
//! domain entities optimized for network transfer.

pub mod job;
pub mod log;
pub mod pipeline;
pub mod project;
pub mod quota;
pub mod runner;
pub mod trigger;
