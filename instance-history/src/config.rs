//! Replay configuration types
//!
//! The engine has very little to configure: events are folded as given, and
//! the only policy decision is what to do when the caller breaks the
//! newest-first ordering contract.

use serde::{Deserialize, Serialize};

/// What a builder does with an event newer than the one before it, or older
/// than the creation of its instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfOrderPolicy {
    /// Fail the operation with `HistoryError::OutOfOrderEvent` or
    /// `HistoryError::EventBeforeCreation`
    #[default]
    Reject,
    /// Log a warning and ignore the event
    Skip,
}

/// Configuration for instance history builders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Handling of events that violate the newest-first ordering
    #[serde(default)]
    pub out_of_order: OutOfOrderPolicy,
}

impl ReplayConfig {
    /// Create a new replay configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the out-of-order policy
    pub fn with_out_of_order_policy(mut self, policy: OutOfOrderPolicy) -> Self {
        self.out_of_order = policy;
        self
    }

    /// Check whether out-of-order events should fail the replay
    pub fn rejects_out_of_order(&self) -> bool {
        self.out_of_order == OutOfOrderPolicy::Reject
    }
}
