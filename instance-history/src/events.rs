//! Typed lifecycle events
//!
//! Classifying raw audit-log records happens upstream; by the time an event
//! reaches this library it is one of three variants. Builders consume them
//! newest first.

use crate::types::{ImageReference, InstanceReference, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an instance stopped running
///
/// All reasons bound a placement the same way. The reason is kept for logging
/// and reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Stopped by a user or API call
    #[default]
    Stopped,
    /// Deleted by a user or API call
    Deleted,
    /// Terminated by the platform during host maintenance
    TerminatedOnHostMaintenance,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Stopped => write!(f, "stopped"),
            StopReason::Deleted => write!(f, "deleted"),
            StopReason::TerminatedOnHostMaintenance => {
                write!(f, "terminated during host maintenance")
            }
        }
    }
}

/// A single lifecycle event for one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The instance was created
    Insert {
        instance_id: u64,
        timestamp: Timestamp,
        reference: InstanceReference,
        #[serde(default)]
        image: Option<ImageReference>,
    },

    /// The instance stopped running (stop, delete, or host maintenance)
    Stop {
        instance_id: u64,
        timestamp: Timestamp,
        #[serde(default)]
        reference: Option<InstanceReference>,
        #[serde(default)]
        reason: StopReason,
    },

    /// The instance was confirmed to run on a sole-tenant node
    SetPlacement {
        instance_id: u64,
        timestamp: Timestamp,
        node_id: String,
    },
}

impl LifecycleEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> Timestamp {
        match self {
            LifecycleEvent::Insert { timestamp, .. } => *timestamp,
            LifecycleEvent::Stop { timestamp, .. } => *timestamp,
            LifecycleEvent::SetPlacement { timestamp, .. } => *timestamp,
        }
    }

    /// Get the id of the instance this event belongs to
    pub fn instance_id(&self) -> u64 {
        match self {
            LifecycleEvent::Insert { instance_id, .. } => *instance_id,
            LifecycleEvent::Stop { instance_id, .. } => *instance_id,
            LifecycleEvent::SetPlacement { instance_id, .. } => *instance_id,
        }
    }

    /// Short name of the variant, for log output
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::Insert { .. } => "insert",
            LifecycleEvent::Stop { .. } => "stop",
            LifecycleEvent::SetPlacement { .. } => "set_placement",
        }
    }
}

/// Sort events newest first, the order builders expect
///
/// The sort is stable, so events sharing a timestamp keep their relative order.
pub fn sort_newest_first(events: &mut [LifecycleEvent]) {
    events.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
}
