//! Finalized per-instance histories

use crate::types::{ImageReference, InstanceHistoryState, InstanceReference, Tenancy, Timestamp};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// An interval during which an instance ran on a sole-tenant node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    /// Physical node (server) id
    pub node_id: String,
    /// Start of the interval (inclusive)
    pub from: Timestamp,
    /// End of the interval (exclusive)
    pub to: Timestamp,
}

impl Placement {
    pub fn new(node_id: impl Into<String>, from: Timestamp, to: Timestamp) -> Self {
        debug_assert!(from <= to, "placement ends before it starts");
        Self {
            node_id: node_id.into(),
            from,
            to,
        }
    }

    pub fn duration(&self) -> Duration {
        self.to - self.from
    }

    /// True if both half-open intervals share at least one instant
    pub fn overlaps(&self, other: &Placement) -> bool {
        self.from < other.to && other.from < self.to
    }
}

/// A placement whose end could not be determined
///
/// Produced when placement evidence is found for a deleted instance before any
/// stop, delete or insert event bounds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingPlacement {
    pub node_id: String,
    pub from: Timestamp,
}

/// Reconstructed history of a single instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceHistory {
    pub instance_id: u64,
    pub reference: Option<InstanceReference>,
    pub state: InstanceHistoryState,
    pub image: Option<ImageReference>,
    pub tenancy: Tenancy,
    /// Ordered ascending by `from`, pairwise non-overlapping
    #[serde(default)]
    pub placements: Vec<Placement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dangling_placement: Option<DanglingPlacement>,
}

impl InstanceHistory {
    /// Create a history from already known parts
    ///
    /// Placements are sorted by start time; no other normalization happens.
    pub fn new(
        instance_id: u64,
        reference: Option<InstanceReference>,
        state: InstanceHistoryState,
        image: Option<ImageReference>,
        tenancy: Tenancy,
        mut placements: Vec<Placement>,
    ) -> Self {
        placements.sort_by(|a, b| a.from.cmp(&b.from));
        Self {
            instance_id,
            reference,
            state,
            image,
            tenancy,
            placements,
            dangling_placement: None,
        }
    }

    /// True if placement evidence exists without a known upper boundary
    pub fn is_defunct(&self) -> bool {
        self.dangling_placement.is_some()
    }

    /// Earliest placement start, if any
    pub fn first_placed(&self) -> Option<Timestamp> {
        self.placements.first().map(|p| p.from)
    }

    /// Latest placement end, if any
    pub fn last_placed(&self) -> Option<Timestamp> {
        self.placements.iter().map(|p| p.to).max()
    }
}
