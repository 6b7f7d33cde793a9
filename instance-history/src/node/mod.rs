//! Node usage aggregation
//!
//! Groups finalized instance placements by the sole-tenant node they ran on.

pub mod history;
pub mod sweep;

pub use history::{NodeHistory, NodePlacement, NodeSetHistory};
pub use sweep::{occupancy, peak_concurrency, OccupancyStep};
