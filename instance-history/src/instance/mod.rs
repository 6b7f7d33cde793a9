//! Per-instance history reconstruction
//!
//! This module contains the builder that folds one instance's lifecycle
//! events into a placement timeline, and the set builder that routes a mixed
//! event stream to per-instance builders.

pub mod builder;
pub mod history;
pub mod set;

// Re-export key types for convenience
pub use builder::{replay, InstanceHistoryBuilder};
pub use history::{DanglingPlacement, InstanceHistory, Placement};
pub use set::{InstanceSetHistory, InstanceSetHistoryBuilder, InstanceSnapshot};
