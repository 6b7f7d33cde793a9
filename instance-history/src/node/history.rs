//! Per-node usage aggregated from instance histories

use crate::instance::InstanceHistory;
use crate::node::sweep::{self, OccupancyStep};
use crate::types::{Tenancy, Timestamp};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

fn serialize_instance_id<S>(instance: &&InstanceHistory, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(instance.instance_id)
}

/// A placement on a node, tagged with the instance that occupied it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodePlacement<'a> {
    #[serde(rename = "instance_id", serialize_with = "serialize_instance_id")]
    pub instance: &'a InstanceHistory,
    pub from: Timestamp,
    pub to: Timestamp,
}

/// Usage statistics for a single node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeHistory<'a> {
    pub node_id: String,
    /// Earliest placement start on this node
    pub first_use: Timestamp,
    /// Latest placement end on this node
    pub last_use: Timestamp,
    /// Highest number of instances placed on this node at the same time
    pub peak_concurrent_placements: usize,
    /// Ordered by `from`, then instance id
    pub placements: Vec<NodePlacement<'a>>,
}

impl<'a> NodeHistory<'a> {
    /// Aggregate the placements of one node
    ///
    /// Returns `None` if there are no placements.
    pub fn new(node_id: impl Into<String>, mut placements: Vec<NodePlacement<'a>>) -> Option<Self> {
        let first_use = placements.iter().map(|p| p.from).min()?;
        let last_use = placements.iter().map(|p| p.to).max()?;

        // Zero-length placements never overlap anything, but the node was still used
        let peak_concurrent_placements =
            sweep::peak_concurrency(placements.iter().map(|p| (p.from, p.to))).max(1);

        placements.sort_by(|a, b| {
            a.from
                .cmp(&b.from)
                .then(a.instance.instance_id.cmp(&b.instance.instance_id))
        });

        Some(Self {
            node_id: node_id.into(),
            first_use,
            last_use,
            peak_concurrent_placements,
            placements,
        })
    }

    /// Distinct instances that ran on this node
    pub fn instance_ids(&self) -> BTreeSet<u64> {
        self.placements
            .iter()
            .map(|p| p.instance.instance_id)
            .collect()
    }

    /// Number of concurrent placements over time
    pub fn occupancy(&self) -> Vec<OccupancyStep> {
        sweep::occupancy(self.placements.iter().map(|p| (p.from, p.to)))
    }
}

/// Usage statistics for all sole-tenant nodes seen in a set of instances
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSetHistory<'a> {
    /// One entry per node, ordered by node id
    pub nodes: Vec<NodeHistory<'a>>,
}

impl<'a> NodeSetHistory<'a> {
    /// Group the placements of sole-tenant instances by node
    ///
    /// Fleet instances and instances without placements are skipped.
    pub fn from_instance_histories<I>(instances: I) -> Self
    where
        I: IntoIterator<Item = &'a InstanceHistory>,
    {
        let mut by_node: BTreeMap<&'a str, Vec<NodePlacement<'a>>> = BTreeMap::new();

        for instance in instances {
            if instance.tenancy == Tenancy::Fleet || instance.placements.is_empty() {
                log::trace!("Skipping instance {} for node aggregation", instance.instance_id);
                continue;
            }

            for placement in &instance.placements {
                by_node
                    .entry(placement.node_id.as_str())
                    .or_default()
                    .push(NodePlacement {
                        instance,
                        from: placement.from,
                        to: placement.to,
                    });
            }
        }

        let nodes: Vec<NodeHistory<'a>> = by_node
            .into_iter()
            .filter_map(|(node_id, placements)| NodeHistory::new(node_id, placements))
            .collect();

        log::debug!("Aggregated placements for {} nodes", nodes.len());
        Self { nodes }
    }

    /// Look up a node by id
    pub fn node(&self, node_id: &str) -> Option<&NodeHistory<'a>> {
        self.nodes
            .binary_search_by(|n| n.node_id.as_str().cmp(node_id))
            .ok()
            .map(|idx| &self.nodes[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Highest peak concurrency across all nodes
    pub fn peak_concurrent_placements(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| n.peak_concurrent_placements)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Placement;
    use crate::types::{ImageReference, InstanceHistoryState, InstanceReference};
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2019, 12, d, 0, 0, 0).unwrap()
    }

    fn instance(instance_id: u64, tenancy: Tenancy, placements: Vec<Placement>) -> InstanceHistory {
        InstanceHistory::new(
            instance_id,
            Some(InstanceReference::new("project-1", "zone-1", "instance-1")),
            InstanceHistoryState::MissingTenancy,
            Some(ImageReference::new("project-1", "image-1")),
            tenancy,
            placements,
        )
    }

    #[test]
    fn test_fleet_instances_are_ignored() {
        let instances = vec![instance(
            1,
            Tenancy::Fleet,
            vec![Placement::new("server-1", day(1), day(2))],
        )];

        let nodes = NodeSetHistory::from_instance_histories(&instances);
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_instances_without_placements_are_ignored() {
        let instances = vec![instance(1, Tenancy::SoleTenant, Vec::new())];

        let nodes = NodeSetHistory::from_instance_histories(&instances);
        assert!(nodes.nodes.is_empty());
        assert_eq!(nodes.peak_concurrent_placements(), 0);
    }

    #[test]
    fn test_non_overlapping_placements_have_peak_of_one() {
        let instances = vec![instance(
            1,
            Tenancy::SoleTenant,
            vec![
                Placement::new("server-1", day(1), day(2)),
                Placement::new("server-1", day(3), day(4)),
                Placement::new("server-2", day(4), day(5)),
            ],
        )];

        let nodes = NodeSetHistory::from_instance_histories(&instances);
        assert_eq!(nodes.nodes.len(), 2);
        assert_eq!(nodes.node("server-1").unwrap().peak_concurrent_placements, 1);
        assert_eq!(nodes.node("server-2").unwrap().peak_concurrent_placements, 1);
    }

    #[test]
    fn test_first_and_last_use_are_extremes() {
        let instances = vec![instance(
            1,
            Tenancy::SoleTenant,
            vec![
                Placement::new("server-1", day(1), day(2)),
                Placement::new("server-1", day(13), day(14)),
                Placement::new("server-2", day(4), day(5)),
            ],
        )];

        let nodes = NodeSetHistory::from_instance_histories(&instances);

        let server1 = nodes.node("server-1").unwrap();
        assert_eq!(server1.first_use, day(1));
        assert_eq!(server1.last_use, day(14));

        let server2 = nodes.node("server-2").unwrap();
        assert_eq!(server2.first_use, day(4));
        assert_eq!(server2.last_use, day(5));
    }

    #[test]
    fn test_overlapping_placements_have_peak_of_two() {
        let instances = vec![
            instance(1, Tenancy::SoleTenant, vec![Placement::new("server-1", day(1), day(4))]),
            instance(2, Tenancy::SoleTenant, vec![Placement::new("server-1", day(2), day(3))]),
        ];

        let nodes = NodeSetHistory::from_instance_histories(&instances);
        assert_eq!(nodes.nodes.len(), 1);

        let server1 = nodes.node("server-1").unwrap();
        assert_eq!(server1.peak_concurrent_placements, 2);
        assert_eq!(server1.first_use, day(1));
        assert_eq!(server1.last_use, day(4));
    }

    #[test]
    fn test_placements_reference_their_instances() {
        let instances = vec![
            instance(1, Tenancy::SoleTenant, vec![Placement::new("server-1", day(1), day(4))]),
            instance(2, Tenancy::SoleTenant, vec![Placement::new("server-1", day(2), day(3))]),
        ];

        let nodes = NodeSetHistory::from_instance_histories(&instances);
        let server1 = nodes.node("server-1").unwrap();
        assert_eq!(server1.placements.len(), 2);

        let first = server1
            .placements
            .iter()
            .find(|p| p.instance.instance_id == 1)
            .unwrap();
        assert_eq!((first.from, first.to), (day(1), day(4)));

        let second = server1
            .placements
            .iter()
            .find(|p| p.instance.instance_id == 2)
            .unwrap();
        assert_eq!((second.from, second.to), (day(2), day(3)));
        assert_eq!(server1.instance_ids().into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_unknown_tenancy_with_placements_is_included() {
        let instances = vec![instance(
            1,
            Tenancy::Unknown,
            vec![Placement::new("server-1", day(1), day(2))],
        )];

        let nodes = NodeSetHistory::from_instance_histories(&instances);
        assert_eq!(nodes.nodes.len(), 1);
    }

    #[test]
    fn test_zero_length_placement_counts_as_use() {
        let instances = vec![instance(
            1,
            Tenancy::SoleTenant,
            vec![Placement::new("server-1", day(2), day(2))],
        )];

        let nodes = NodeSetHistory::from_instance_histories(&instances);
        assert_eq!(nodes.node("server-1").unwrap().peak_concurrent_placements, 1);
    }

    #[test]
    fn test_node_placements_serialize_instance_id() {
        let instances = vec![instance(
            7,
            Tenancy::SoleTenant,
            vec![Placement::new("server-1", day(1), day(2))],
        )];

        let nodes = NodeSetHistory::from_instance_histories(&instances);
        let json = serde_json::to_value(&nodes).unwrap();
        assert_eq!(json["nodes"][0]["node_id"], "server-1");
        assert_eq!(json["nodes"][0]["placements"][0]["instance_id"], 7);
    }
}
