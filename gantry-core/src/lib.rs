//! Gantry Core
//!
//! Core types and lifecycle rules for the Gantry CI/CD system.
//!
//! This crate contains:
//! - Domain types: Core business entities (Pipeline, Job, Runner, Trigger, Quota)
//! - DTOs: Data transfer objects for inter-service communication
//! - Lifecycle rules: stage processing, composite status and runner matching.
//!   These are pure functions so the orchestrator can call them under its
//!   own locking and persistence.

pub mod composite;
pub mod domain;
pub mod dto;
pub mod error;
pub mod event;
pub mod feature;
pub mod matching;
pub mod processing;
pub mod validation;
