//! bacmap-graph: Topology graph model for BACnet internetwork scans.
//!
//! One `TopologyGraph` records everything a single scan discovered:
//! devices, routers, BBMDs, subnets, and logical networks, tied together
//! by a fixed set of relation kinds. The graph serializes to a triple
//! interchange format (`kind://id` node keys), snapshots to disk, and
//! diffs structurally against other snapshots.

pub mod diff;
pub mod error;
pub mod model;
pub mod queries;
pub mod snapshot;
pub mod triples;

pub use diff::{diff_graphs, diff_snapshots, DiffSummary, GraphDiff};
pub use error::{GraphError, Result};
pub use model::{
    NodeKey, NodeKind, NodeRecord, Property, PropertyValue, RelationKind, TopologyGraph,
};
pub use snapshot::Snapshot;
pub use triples::{Predicate, Triple, TripleObject};
