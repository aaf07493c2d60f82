//! Shared utilities for the Reaktor build orchestrator.
//!
//! This crate provides the cross-cutting concerns used by all other Reaktor
//! crates: the unified error type and result aliases.

pub mod errors;
