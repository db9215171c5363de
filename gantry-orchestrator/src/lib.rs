//! Gantry Orchestrator
//!
//! Owns pipeline and job state: stage processing, runner assignment,
//! triggers and quotas behind an HTTP API.

pub mod api;
pub mod config;
pub mod db;
pub mod events;
pub mod service;
pub mod state;
pub mod store;
