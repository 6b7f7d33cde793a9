//! Instance History Library
//!
//! A pure, in-memory engine that reconstructs where virtual machine instances
//! ran from their audit-log lifecycle events, and how busy each sole-tenant
//! node was as a result.
//!
//! # Architecture
//!
//! - Lifecycle events (insert, stop, set placement) for one instance are
//!   replayed newest first into an [`InstanceHistoryBuilder`]
//! - The builder folds them into an [`InstanceHistory`]: tenancy, image,
//!   a non-overlapping placement timeline and a confidence state
//! - [`NodeSetHistory`] groups many histories by node and computes first/last
//!   use and peak concurrent placements
//!
//! The library does NOT:
//! - Fetch or paginate audit logs
//! - Parse raw log records into typed events
//! - Persist anything
//!
//! Callers fetch older log pages for as long as
//! [`InstanceHistoryBuilder::is_more_information_needed`] says so.
//!
//! # Example Usage
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use instance_history::{
//!     InstanceHistoryBuilder, InstanceReference, NodeSetHistory, StopReason, Tenancy,
//! };
//!
//! let day = |d| Utc.with_ymd_and_hms(2019, 12, d, 0, 0, 0).unwrap();
//!
//! // Events arrive newest first
//! let mut builder = InstanceHistoryBuilder::for_deleted_instance(1);
//! builder.on_stop(day(31), None, StopReason::Deleted).unwrap();
//! builder.on_set_placement("server-2", day(30)).unwrap();
//! builder
//!     .on_insert(day(29), InstanceReference::new("project-1", "zone-1", "vm-1"), None)
//!     .unwrap();
//! assert!(!builder.is_more_information_needed());
//!
//! let history = builder.build();
//! assert_eq!(history.tenancy, Tenancy::SoleTenant);
//!
//! let histories = vec![history];
//! let nodes = NodeSetHistory::from_instance_histories(&histories);
//! assert_eq!(nodes.node("server-2").unwrap().peak_concurrent_placements, 1);
//! ```

// Public modules
pub mod config;
pub mod events;
pub mod instance;
pub mod node;
pub mod types;

// Re-export main types for convenience
pub use config::{OutOfOrderPolicy, ReplayConfig};
pub use events::{sort_newest_first, LifecycleEvent, StopReason};
pub use instance::{
    replay, DanglingPlacement, InstanceHistory, InstanceHistoryBuilder, InstanceSetHistory,
    InstanceSetHistoryBuilder, InstanceSnapshot, Placement,
};
pub use node::{NodeHistory, NodePlacement, NodeSetHistory, OccupancyStep};
pub use types::{
    HistoryError, ImageReference, InstanceHistoryState, InstanceReference, Result, Tenancy,
    Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty deleted-instance builder needs more data
        let builder = InstanceHistoryBuilder::for_deleted_instance(42);
        assert!(builder.is_more_information_needed());
        assert!(!builder.is_defunct());
        assert!(!VERSION.is_empty());
    }
}
