//! Artifact resolution engine for the Reaktor build orchestrator.
//!
//! Expands a root artifact's declared dependencies into a resolution tree,
//! mediates version conflicts pairwise under a fixed policy, and flattens
//! the surviving nodes into a reproducibly ordered artifact list.

pub mod conflict;
pub mod tree;
pub mod version;
