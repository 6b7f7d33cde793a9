//! Histories for a set of instances
//!
//! Routes an interleaved, newest-first event stream to one builder per
//! instance. Instances known from a live snapshot get existing-instance
//! builders up front; any other instance id seen in the stream is treated as
//! deleted.

use crate::config::ReplayConfig;
use crate::events::LifecycleEvent;
use crate::instance::builder::InstanceHistoryBuilder;
use crate::instance::history::InstanceHistory;
use crate::node::NodeSetHistory;
use crate::types::{ImageReference, InstanceReference, Result, Tenancy, Timestamp};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A currently existing instance, as reported by a live inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub instance_id: u64,
    pub reference: InstanceReference,
    #[serde(default)]
    pub image: Option<ImageReference>,
    #[serde(default)]
    pub tenancy: Tenancy,
    pub last_seen: Timestamp,
}

/// Builds histories for every instance in a reporting window
///
/// `start` and `end` only label the result. Events outside the window are
/// still replayed: creations older than `start` are what make a deleted
/// instance complete.
pub struct InstanceSetHistoryBuilder {
    start: Timestamp,
    end: Timestamp,
    config: ReplayConfig,
    builders: HashMap<u64, InstanceHistoryBuilder>,
}

impl InstanceSetHistoryBuilder {
    /// Create a builder whose result is labelled with the window `start..end`
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        debug_assert!(start <= end, "reporting window ends before it starts");
        Self {
            start,
            end,
            config: ReplayConfig::default(),
            builders: HashMap::new(),
        }
    }

    /// Builder method: configuration for all instance builders created later
    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Number of instances tracked so far
    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Register an instance that currently exists
    pub fn add_existing_instance(
        &mut self,
        instance_id: u64,
        reference: InstanceReference,
        image: Option<ImageReference>,
        tenancy: Tenancy,
        last_seen: Timestamp,
    ) {
        let builder = InstanceHistoryBuilder::for_existing_instance(
            instance_id,
            reference,
            image,
            tenancy,
            last_seen,
        )
        .with_config(self.config.clone());

        if self.builders.insert(instance_id, builder).is_some() {
            log::warn!("Instance {} registered more than once, keeping latest", instance_id);
        }
    }

    /// Register an instance from a live snapshot record
    pub fn add_snapshot(&mut self, snapshot: &InstanceSnapshot) {
        self.add_existing_instance(
            snapshot.instance_id,
            snapshot.reference.clone(),
            snapshot.image.clone(),
            snapshot.tenancy,
            snapshot.last_seen,
        );
    }

    /// Get the builder for an instance, creating a deleted-instance builder on first use
    pub fn builder_for(&mut self, instance_id: u64) -> &mut InstanceHistoryBuilder {
        let config = &self.config;
        self.builders.entry(instance_id).or_insert_with(|| {
            log::debug!("Tracking deleted instance {}", instance_id);
            InstanceHistoryBuilder::for_deleted_instance(instance_id).with_config(config.clone())
        })
    }

    /// Route a single event to its instance's builder
    pub fn process(&mut self, event: &LifecycleEvent) -> Result<()> {
        self.builder_for(event.instance_id()).apply(event)
    }

    /// Route a newest-first sequence of events
    pub fn process_all<'a, I>(&mut self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a LifecycleEvent>,
    {
        events.into_iter().try_for_each(|event| self.process(event))
    }

    /// True if any instance still needs older log data
    pub fn is_more_information_needed(&self) -> bool {
        self.builders.values().any(|b| b.is_more_information_needed())
    }

    /// Ids of instances that still need older log data, ascending
    pub fn instances_needing_more_information(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .builders
            .values()
            .filter(|b| b.is_more_information_needed())
            .map(|b| b.instance_id())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Finalize all instance histories
    ///
    /// Instances are independent, so they are built in parallel.
    pub fn build(self) -> InstanceSetHistory {
        let mut instances: Vec<InstanceHistory> = self
            .builders
            .into_par_iter()
            .map(|(_, builder)| builder.build())
            .collect();
        instances.sort_by_key(|i| i.instance_id);

        log::info!(
            "Built {} instance histories ({} defunct, {} incomplete)",
            instances.len(),
            instances.iter().filter(|i| i.is_defunct()).count(),
            instances.iter().filter(|i| !i.state.is_complete()).count()
        );

        InstanceSetHistory {
            start: self.start,
            end: self.end,
            instances,
        }
    }
}

/// Finalized histories for all instances of a reporting window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSetHistory {
    /// Reporting window as passed to the builder; placements are not clipped to it
    pub start: Timestamp,
    pub end: Timestamp,
    /// Ordered by instance id
    pub instances: Vec<InstanceHistory>,
}

impl InstanceSetHistory {
    pub fn instance(&self, instance_id: u64) -> Option<&InstanceHistory> {
        self.instances
            .binary_search_by_key(&instance_id, |i| i.instance_id)
            .ok()
            .map(|idx| &self.instances[idx])
    }

    /// Aggregate the placements of these instances by node
    pub fn node_set(&self) -> NodeSetHistory<'_> {
        NodeSetHistory::from_instance_histories(&self.instances)
    }
}
