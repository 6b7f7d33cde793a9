//! Per-instance history builder
//!
//! Events are replayed newest first, walking backward from the last time the
//! instance was seen (or stopped) toward its creation. The builder keeps at
//! most one open placement: the oldest segment seen so far, whose start may
//! still move further back in time while more placement events for the same
//! node arrive.
//!
//! ```text
//!   creation                                          upper boundary
//!      |<-- finalized --><-- finalized --><-- open -->|
//!   insert            set_placement   set_placement   stop / last seen
//! ```

use crate::config::{OutOfOrderPolicy, ReplayConfig};
use crate::events::{LifecycleEvent, StopReason};
use crate::instance::history::{DanglingPlacement, InstanceHistory, Placement};
use crate::types::{
    HistoryError, ImageReference, InstanceHistoryState, InstanceReference, Result, Tenancy,
    Timestamp,
};

/// The segment currently being extended backward in time
#[derive(Debug, Clone)]
struct OpenPlacement {
    node_id: String,
    from: Timestamp,
    /// `None` when no boundary was known when the segment was opened
    to: Option<Timestamp>,
}

/// Folds one instance's lifecycle events into an [`InstanceHistory`]
#[derive(Debug, Clone)]
pub struct InstanceHistoryBuilder {
    instance_id: u64,
    reference: Option<InstanceReference>,
    image: Option<ImageReference>,
    tenancy: Tenancy,
    config: ReplayConfig,

    /// Created from a live snapshot rather than reconstructed
    exists: bool,
    upper_boundary: Option<Timestamp>,
    open_placement: Option<OpenPlacement>,
    /// Finalized placements, newest first
    placements: Vec<Placement>,
    dangling_placement: Option<DanglingPlacement>,
    insert_seen: bool,
    is_defunct: bool,
    last_timestamp: Option<Timestamp>,
}

impl InstanceHistoryBuilder {
    fn new(instance_id: u64) -> Self {
        Self {
            instance_id,
            reference: None,
            image: None,
            tenancy: Tenancy::Unknown,
            config: ReplayConfig::default(),
            exists: false,
            upper_boundary: None,
            open_placement: None,
            placements: Vec::new(),
            dangling_placement: None,
            insert_seen: false,
            is_defunct: false,
            last_timestamp: None,
        }
    }

    /// Builder for an instance that currently exists
    ///
    /// Identity, image and tenancy come from a live source and are not
    /// overwritten by replayed events. `last_seen` bounds the newest placement,
    /// and events newer than it break the ordering contract.
    pub fn for_existing_instance(
        instance_id: u64,
        reference: InstanceReference,
        image: Option<ImageReference>,
        tenancy: Tenancy,
        last_seen: Timestamp,
    ) -> Self {
        Self {
            reference: Some(reference),
            image,
            tenancy,
            exists: true,
            upper_boundary: Some(last_seen),
            last_timestamp: Some(last_seen),
            ..Self::new(instance_id)
        }
    }

    /// Builder for an instance that no longer exists
    ///
    /// Everything besides the id has to be reconstructed from events.
    pub fn for_deleted_instance(instance_id: u64) -> Self {
        Self::new(instance_id)
    }

    /// Builder method: use a specific replay configuration
    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn tenancy(&self) -> Tenancy {
        self.tenancy
    }

    /// True while the creation of a deleted instance has not been found yet
    pub fn is_more_information_needed(&self) -> bool {
        !self.exists && !self.insert_seen
    }

    /// True once a placement had to be opened without a known upper boundary
    pub fn is_defunct(&self) -> bool {
        self.is_defunct
    }

    /// Check the newest-first ordering contract
    ///
    /// Nothing may follow the insert: events older than the creation of an
    /// instance cannot belong to it. Returns `Ok(false)` if the event is to
    /// be skipped.
    fn accept(&mut self, timestamp: Timestamp, kind: &str) -> Result<bool> {
        let violation = match self.last_timestamp {
            Some(created) if self.insert_seen => Some(HistoryError::EventBeforeCreation {
                instance_id: self.instance_id,
                created,
                timestamp,
            }),
            Some(previous) if timestamp > previous => Some(HistoryError::OutOfOrderEvent {
                instance_id: self.instance_id,
                previous,
                timestamp,
            }),
            _ => None,
        };

        if let Some(error) = violation {
            return match self.config.out_of_order {
                OutOfOrderPolicy::Reject => Err(error),
                OutOfOrderPolicy::Skip => {
                    log::warn!("Skipping {} event: {}", kind, error);
                    Ok(false)
                }
            };
        }

        self.last_timestamp = Some(timestamp);
        Ok(true)
    }

    /// Move the open placement (if any) into the finalized list
    ///
    /// Returns the start of the closed segment.
    fn close_open_placement(&mut self) -> Option<Timestamp> {
        let open = self.open_placement.take()?;

        match open.to {
            Some(to) => self.placements.push(Placement::new(open.node_id, open.from, to)),
            None => {
                log::warn!(
                    "Instance {} was placed on {} at {} but no stop or delete bounds the placement",
                    self.instance_id,
                    open.node_id,
                    open.from
                );
                self.dangling_placement = Some(DanglingPlacement {
                    node_id: open.node_id,
                    from: open.from,
                });
            }
        }

        Some(open.from)
    }

    /// Register the creation of the instance
    pub fn on_insert(
        &mut self,
        timestamp: Timestamp,
        reference: InstanceReference,
        image: Option<ImageReference>,
    ) -> Result<()> {
        if !self.accept(timestamp, "insert")? {
            return Ok(());
        }
        log::debug!("Instance {}: insert at {}", self.instance_id, timestamp);

        if !self.tenancy.is_known() {
            // No placement seen before creation: shared hardware
            self.tenancy = Tenancy::Fleet;
        }

        if self.reference.is_none() {
            self.reference = Some(reference);
        }
        if self.image.is_none() {
            self.image = image;
        }

        self.close_open_placement();
        self.insert_seen = true;
        Ok(())
    }

    /// Register that the instance stopped running
    ///
    /// Closes the open placement, so a subsequent (older) placement on the
    /// same node starts a new segment instead of extending this one.
    pub fn on_stop(
        &mut self,
        timestamp: Timestamp,
        reference: Option<InstanceReference>,
        reason: StopReason,
    ) -> Result<()> {
        if !self.accept(timestamp, "stop")? {
            return Ok(());
        }
        log::debug!("Instance {}: {} at {}", self.instance_id, reason, timestamp);

        if self.reference.is_none() {
            self.reference = reference;
        }

        self.close_open_placement();
        self.upper_boundary = Some(timestamp);
        Ok(())
    }

    /// Register that the instance was running on `node_id` at `timestamp`
    pub fn on_set_placement(&mut self, node_id: &str, timestamp: Timestamp) -> Result<()> {
        if !self.accept(timestamp, "set_placement")? {
            return Ok(());
        }

        if !self.tenancy.is_known() {
            self.tenancy = Tenancy::SoleTenant;
        }

        let extends_open = matches!(
            &self.open_placement,
            Some(open) if open.node_id == node_id
        );

        if extends_open {
            if let Some(open) = self.open_placement.as_mut() {
                log::trace!(
                    "Instance {}: extending placement on {} back to {}",
                    self.instance_id,
                    node_id,
                    timestamp
                );
                open.from = timestamp;
            }
            return Ok(());
        }

        let boundary = self.close_open_placement().or(self.upper_boundary);
        if boundary.is_none() {
            self.is_defunct = true;
        }

        log::debug!(
            "Instance {}: placed on {} at {} (until {:?})",
            self.instance_id,
            node_id,
            timestamp,
            boundary
        );
        self.open_placement = Some(OpenPlacement {
            node_id: node_id.to_string(),
            from: timestamp,
            to: boundary,
        });
        Ok(())
    }

    /// Dispatch a typed event to the matching operation
    pub fn apply(&mut self, event: &LifecycleEvent) -> Result<()> {
        if event.instance_id() != self.instance_id {
            return Err(HistoryError::InstanceMismatch {
                expected: self.instance_id,
                actual: event.instance_id(),
            });
        }

        match event {
            LifecycleEvent::Insert {
                timestamp,
                reference,
                image,
                ..
            } => self.on_insert(*timestamp, reference.clone(), image.clone()),
            LifecycleEvent::Stop {
                timestamp,
                reference,
                reason,
                ..
            } => self.on_stop(*timestamp, reference.clone(), *reason),
            LifecycleEvent::SetPlacement {
                timestamp, node_id, ..
            } => self.on_set_placement(node_id, *timestamp),
        }
    }

    fn state(&self) -> InstanceHistoryState {
        if self.exists {
            InstanceHistoryState::Complete
        } else if self.reference.is_none() {
            InstanceHistoryState::MissingName
        } else if !self.tenancy.is_known() {
            InstanceHistoryState::MissingTenancy
        } else if self.image.is_none() {
            InstanceHistoryState::MissingImage
        } else if self.is_defunct {
            InstanceHistoryState::MissingStopEvent
        } else {
            InstanceHistoryState::Complete
        }
    }

    /// Finalize the history
    pub fn build(mut self) -> InstanceHistory {
        self.close_open_placement();
        self.placements.reverse();

        let state = self.state();
        if self.is_defunct {
            log::warn!(
                "Instance {} is defunct: placement history has no upper boundary",
                self.instance_id
            );
        }

        InstanceHistory {
            instance_id: self.instance_id,
            reference: self.reference,
            state,
            image: self.image,
            tenancy: self.tenancy,
            placements: self.placements,
            dangling_placement: self.dangling_placement,
        }
    }
}

/// Fold an ordered (newest first) event sequence into a history
pub fn replay<'a, I>(builder: InstanceHistoryBuilder, events: I) -> Result<InstanceHistory>
where
    I: IntoIterator<Item = &'a LifecycleEvent>,
{
    let builder = events
        .into_iter()
        .try_fold(builder, |mut builder, event| {
            builder.apply(event)?;
            Ok::<_, HistoryError>(builder)
        })?;
    Ok(builder.build())
}
