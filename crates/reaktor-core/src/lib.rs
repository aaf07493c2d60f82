//! Core data types for the Reaktor build orchestrator.
//!
//! This crate defines the fundamental types that represent a multi-module
//! build: module identities and their declared inter-module dependencies,
//! external artifact coordinates with conflict keys, dependency scopes,
//! and orchestration configuration.
//!
//! This crate is intentionally free of threading and I/O; the orchestration
//! machinery lives in `reaktor-graph` and `reaktor-resolver`.

pub mod artifact;
pub mod config;
pub mod module;
