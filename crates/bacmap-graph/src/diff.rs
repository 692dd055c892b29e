//! Structural comparison of two topology graphs.
//!
//! Node keys are absolute (`kind://id`) and the store orders canonically,
//! so sorted triple sets are a normal form: structurally identical graphs
//! compare equal no matter what order discovery wrote them in. The merged
//! output carries the union of both sides plus provenance relations for
//! entries unique to one side, for downstream add/remove rendering.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::Result;
use crate::model::{NodeKey, RelationKind, TopologyGraph};
use crate::snapshot::Snapshot;
use crate::triples::Triple;

/// Outcome of diffing graph A against graph B.
#[derive(Debug)]
pub struct GraphDiff {
    /// Triples present in both graphs.
    pub in_both: Vec<Triple>,
    /// Triples only in A (removed, when A is the older snapshot).
    pub only_in_a: Vec<Triple>,
    /// Triples only in B (added, when B is the newer snapshot).
    pub only_in_b: Vec<Triple>,
    /// Union of both graphs; one-side-only subjects carry a
    /// `source-snapshot` relation naming their side.
    pub merged: TopologyGraph,
    pub summary: DiffSummary,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub in_both: usize,
    pub only_in_a: usize,
    pub only_in_b: usize,
}

/// Diff two graphs with generic side labels.
pub fn diff_graphs(a: &TopologyGraph, b: &TopologyGraph) -> Result<GraphDiff> {
    diff_labeled(a, b, "a", "b")
}

/// Diff two snapshots, labeling provenance with their scan ids.
///
/// Either snapshot failing to restore fails the whole diff call; a scan
/// running elsewhere is unaffected.
pub fn diff_snapshots(a: &Snapshot, b: &Snapshot) -> Result<GraphDiff> {
    let graph_a = a.restore()?;
    let graph_b = b.restore()?;
    diff_labeled(
        &graph_a,
        &graph_b,
        &a.scan_id.to_string(),
        &b.scan_id.to_string(),
    )
}

pub fn diff_labeled(
    a: &TopologyGraph,
    b: &TopologyGraph,
    label_a: &str,
    label_b: &str,
) -> Result<GraphDiff> {
    let set_a: BTreeSet<Triple> = a.to_triples().into_iter().collect();
    let set_b: BTreeSet<Triple> = b.to_triples().into_iter().collect();

    let in_both: Vec<Triple> = set_a.intersection(&set_b).cloned().collect();
    let only_in_a: Vec<Triple> = set_a.difference(&set_b).cloned().collect();
    let only_in_b: Vec<Triple> = set_b.difference(&set_a).cloned().collect();

    let mut merged = TopologyGraph::from_triples(set_a.union(&set_b).cloned())?;
    tag_provenance(&mut merged, &only_in_a, label_a)?;
    tag_provenance(&mut merged, &only_in_b, label_b)?;

    let summary = DiffSummary {
        in_both: in_both.len(),
        only_in_a: only_in_a.len(),
        only_in_b: only_in_b.len(),
    };
    tracing::debug!(
        in_both = summary.in_both,
        only_in_a = summary.only_in_a,
        only_in_b = summary.only_in_b,
        "Graph diff computed"
    );

    Ok(GraphDiff {
        in_both,
        only_in_a,
        only_in_b,
        merged,
        summary,
    })
}

/// Attach `source-snapshot` relations for every subject of a
/// one-side-only triple.
fn tag_provenance(merged: &mut TopologyGraph, unique: &[Triple], label: &str) -> Result<()> {
    if unique.is_empty() {
        return Ok(());
    }
    let snapshot_key = NodeKey::snapshot(label);
    merged.ensure(&snapshot_key);

    let subjects: BTreeSet<&NodeKey> = unique.iter().map(|t| &t.subject).collect();
    for subject in subjects {
        merged.add_relation(subject, RelationKind::SourceSnapshot, snapshot_key.clone())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, Property, PropertyValue};
    use bacmap_core::{DeviceInstance, NetworkNumber};

    fn graph_with_devices(instances: &[u32]) -> TopologyGraph {
        let mut graph = TopologyGraph::new();
        for &instance in instances {
            let key = NodeKey::device(DeviceInstance::new(instance).unwrap());
            graph.set_property(
                &key,
                Property::DeviceInstance,
                PropertyValue::Integer(i64::from(instance)),
            );
        }
        graph
    }

    #[test]
    fn diff_of_identical_graphs_is_empty() {
        let graph = graph_with_devices(&[1, 2, 3]);
        let diff = diff_graphs(&graph, &graph.clone()).unwrap();

        assert!(diff.only_in_a.is_empty());
        assert!(diff.only_in_b.is_empty());
        assert_eq!(
            diff.in_both.iter().cloned().collect::<BTreeSet<_>>(),
            graph.to_triples().into_iter().collect::<BTreeSet<_>>()
        );
        // No provenance nodes when nothing differs.
        assert_eq!(diff.merged, graph);
    }

    #[test]
    fn diff_sets_are_disjoint_and_cover_union() {
        let a = graph_with_devices(&[1, 2]);
        let b = graph_with_devices(&[2, 3]);
        let diff = diff_graphs(&a, &b).unwrap();

        let both: BTreeSet<_> = diff.in_both.iter().cloned().collect();
        let only_a: BTreeSet<_> = diff.only_in_a.iter().cloned().collect();
        let only_b: BTreeSet<_> = diff.only_in_b.iter().cloned().collect();

        assert!(both.is_disjoint(&only_a));
        assert!(both.is_disjoint(&only_b));
        assert!(only_a.is_disjoint(&only_b));

        let union: BTreeSet<_> = both
            .iter()
            .chain(only_a.iter())
            .chain(only_b.iter())
            .cloned()
            .collect();
        let expected: BTreeSet<_> = a
            .to_triples()
            .into_iter()
            .chain(b.to_triples())
            .collect();
        assert_eq!(union, expected);
    }

    #[test]
    fn diff_ignores_insertion_order() {
        // Same content, written in opposite order.
        let a = graph_with_devices(&[1, 2, 3]);
        let b = graph_with_devices(&[3, 2, 1]);
        let diff = diff_graphs(&a, &b).unwrap();
        assert!(diff.only_in_a.is_empty());
        assert!(diff.only_in_b.is_empty());
    }

    #[test]
    fn unique_entries_carry_provenance() {
        let a = graph_with_devices(&[1]);
        let b = graph_with_devices(&[1, 9]);
        let diff = diff_graphs(&a, &b).unwrap();

        let unique_device = NodeKey::device(DeviceInstance::new(9).unwrap());
        let record = diff.merged.node(&unique_device).unwrap();
        assert!(record.has_relation(RelationKind::SourceSnapshot, &NodeKey::snapshot("b")));

        // The shared device carries no provenance.
        let shared = NodeKey::device(DeviceInstance::new(1).unwrap());
        let shared_relations = diff.merged.relations_of(&shared);
        assert!(shared_relations
            .iter()
            .all(|(relation, _)| *relation != RelationKind::SourceSnapshot));

        assert_eq!(diff.merged.count_of_kind(NodeKind::Snapshot), 1);
        assert_eq!(diff.summary.only_in_b, 2); // type + device-instance
    }

    #[test]
    fn relation_changes_show_in_diff() {
        let network = NodeKey::network(NetworkNumber::new(5).unwrap());
        let router = NodeKey::new(NodeKind::Router, "10.0.0.1");

        let mut a = TopologyGraph::new();
        a.ensure(&router);
        let mut b = a.clone();
        b.add_relation(&router, RelationKind::RouterToNetwork, network)
            .unwrap();

        let diff = diff_graphs(&a, &b).unwrap();
        assert_eq!(diff.summary.only_in_a, 0);
        assert_eq!(diff.summary.only_in_b, 1);
        assert_eq!(diff.summary.in_both, 1); // the router's type triple
    }
}
