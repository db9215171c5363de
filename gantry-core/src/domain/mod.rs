//! Core domain types
//!
//! This module contains the core domain structures used across Gantry services.
//! These types represent the fundamental business entities and are shared between
//! orchestrator (for persistence) and runner (for execution).

pub mod artifact;
pub mod job;
pub mod log;
pub mod pipeline;
pub mod project;
pub mod quota;
pub mod runner;
pub mod trigger;
