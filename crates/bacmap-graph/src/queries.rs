//! Read helpers over a topology graph.
//!
//! The scanner consults a prior scan's graph for density hints; the CLI
//! summarizes snapshots. Mutations live in `model`.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{NodeKey, NodeKind, Property, PropertyValue, RelationKind, TopologyGraph};

impl TopologyGraph {
    /// Instance numbers of every Device and BBMD node carrying a
    /// `device-instance` property. This is the density hint consumed by
    /// the adaptive Who-Is window planner.
    pub fn device_instances(&self) -> BTreeSet<u32> {
        self.nodes()
            .filter(|(key, _)| matches!(key.kind(), NodeKind::Device | NodeKind::Bbmd))
            .filter_map(|(_, record)| match record.property(Property::DeviceInstance) {
                Some(PropertyValue::Integer(raw)) => u32::try_from(*raw).ok(),
                _ => None,
            })
            .collect()
    }

    pub fn count_of_kind(&self, kind: NodeKind) -> usize {
        self.nodes_of_kind(kind).count()
    }

    /// Node counts per kind, for scan summaries and `show` output.
    pub fn kind_counts(&self) -> BTreeMap<NodeKind, usize> {
        let mut counts = BTreeMap::new();
        for (key, _) in self.nodes() {
            *counts.entry(key.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// All outgoing relations of one node.
    pub fn relations_of(&self, key: &NodeKey) -> Vec<(RelationKind, NodeKey)> {
        self.node(key)
            .map(|record| {
                record
                    .relations()
                    .map(|(relation, target)| (relation, target.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
