//! The node/relation store for one scan.
//!
//! Every discovered entity is a node with an absolute `kind://id` key and
//! exactly one kind, assigned at construction. Common properties (label,
//! device-instance, address, vendor-id) overwrite on rewrite; relations
//! append and are idempotent on duplicates. Which relation kinds a node
//! may carry is a fixed function of its kind.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use ipnet::IpNet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use bacmap_core::{BacnetAddress, DeviceInstance, NetworkNumber};

use crate::error::{GraphError, Result};

// ── Node Kinds ────────────────────────────────────────────────────

/// The closed set of entity kinds a topology graph can hold.
///
/// `Scanner` is the distinguished self-node of the scanning station;
/// `Snapshot` nodes appear only in merged diff output as provenance
/// targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    Device,
    Router,
    Bbmd,
    Subnet,
    Network,
    Scanner,
    Snapshot,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Router => "router",
            Self::Bbmd => "bbmd",
            Self::Subnet => "subnet",
            Self::Network => "network",
            Self::Scanner => "scanner",
            Self::Snapshot => "snapshot",
        }
    }

    /// The relation kinds nodes of this kind may carry.
    ///
    /// A fixed capability table: subnets, networks, and snapshots are
    /// relation targets only.
    pub fn applicable_relations(self) -> &'static [RelationKind] {
        match self {
            Self::Device => &[RelationKind::DeviceOnNetwork, RelationKind::DeviceOnSubnet],
            Self::Router => &[
                RelationKind::DeviceOnNetwork,
                RelationKind::DeviceOnSubnet,
                RelationKind::RouterToNetwork,
            ],
            Self::Bbmd => &[RelationKind::BdtEntry, RelationKind::BbmdBroadcastDomain],
            Self::Scanner => &[
                RelationKind::DeviceOnSubnet,
                RelationKind::UnassociatedRouter,
            ],
            Self::Subnet | Self::Network | Self::Snapshot => &[],
        }
    }

    /// Whether a node of this kind may carry the given relation.
    /// Diff provenance (`source-snapshot`) is applicable everywhere.
    pub fn allows(self, relation: RelationKind) -> bool {
        relation == RelationKind::SourceSnapshot
            || self.applicable_relations().contains(&relation)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "device" => Ok(Self::Device),
            "router" => Ok(Self::Router),
            "bbmd" => Ok(Self::Bbmd),
            "subnet" => Ok(Self::Subnet),
            "network" => Ok(Self::Network),
            "scanner" => Ok(Self::Scanner),
            "snapshot" => Ok(Self::Snapshot),
            other => Err(GraphError::Key(format!("unknown node kind `{other}`"))),
        }
    }
}

// ── Relations ─────────────────────────────────────────────────────

/// The fixed predicate vocabulary for relations between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelationKind {
    /// Device or router sits on a logical BACnet network.
    DeviceOnNetwork,
    /// Device sits on an IP subnet.
    DeviceOnSubnet,
    /// Router announces reachability of a network.
    RouterToNetwork,
    /// BBMD lists a peer BBMD in its broadcast distribution table.
    BdtEntry,
    /// Subnet a BBMD relays broadcasts for.
    BbmdBroadcastDomain,
    /// Router whose address matched no known subnet, hung off the
    /// scanner self-node.
    UnassociatedRouter,
    /// Diff provenance: which snapshot an entry came from.
    SourceSnapshot,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeviceOnNetwork => "device-on-network",
            Self::DeviceOnSubnet => "device-on-subnet",
            Self::RouterToNetwork => "router-to-network",
            Self::BdtEntry => "bdt-entry",
            Self::BbmdBroadcastDomain => "bbmd-broadcast-domain",
            Self::UnassociatedRouter => "unassociated-router",
            Self::SourceSnapshot => "source-snapshot",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "device-on-network" => Ok(Self::DeviceOnNetwork),
            "device-on-subnet" => Ok(Self::DeviceOnSubnet),
            "router-to-network" => Ok(Self::RouterToNetwork),
            "bdt-entry" => Ok(Self::BdtEntry),
            "bbmd-broadcast-domain" => Ok(Self::BbmdBroadcastDomain),
            "unassociated-router" => Ok(Self::UnassociatedRouter),
            "source-snapshot" => Ok(Self::SourceSnapshot),
            other => Err(GraphError::Triple(format!("unknown relation `{other}`"))),
        }
    }
}

// ── Properties ────────────────────────────────────────────────────

/// Common single-valued node properties. Last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Property {
    Label,
    DeviceInstance,
    Address,
    VendorId,
}

impl Property {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::DeviceInstance => "device-instance",
            Self::Address => "address",
            Self::VendorId => "vendor-id",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Property {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "label" => Ok(Self::Label),
            "device-instance" => Ok(Self::DeviceInstance),
            "address" => Ok(Self::Address),
            "vendor-id" => Ok(Self::VendorId),
            other => Err(GraphError::Triple(format!("unknown property `{other}`"))),
        }
    }
}

/// A typed literal property value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Iri(String),
}

// ── Node Keys ─────────────────────────────────────────────────────

/// Absolute node identifier of the form `kind://id`,
/// e.g. `device://1234` or `subnet://10.0.0.0/24`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    kind: NodeKind,
    id: String,
}

impl NodeKey {
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn device(instance: DeviceInstance) -> Self {
        Self::new(NodeKind::Device, instance.to_string())
    }

    pub fn bbmd(instance: DeviceInstance) -> Self {
        Self::new(NodeKind::Bbmd, instance.to_string())
    }

    pub fn router(address: &BacnetAddress) -> Self {
        Self::new(NodeKind::Router, address.to_string())
    }

    pub fn subnet(net: IpNet) -> Self {
        Self::new(NodeKind::Subnet, net.to_string())
    }

    pub fn network(network: NetworkNumber) -> Self {
        Self::new(NodeKind::Network, network.to_string())
    }

    pub fn scanner(name: &str) -> Self {
        Self::new(NodeKind::Scanner, name)
    }

    pub fn snapshot(label: &str) -> Self {
        Self::new(NodeKind::Snapshot, label)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind, self.id)
    }
}

impl FromStr for NodeKey {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, id) = s
            .split_once("://")
            .ok_or_else(|| GraphError::Key(s.to_string()))?;
        if id.is_empty() {
            return Err(GraphError::Key(s.to_string()));
        }
        Ok(Self::new(kind.parse::<NodeKind>()?, id))
    }
}

impl Serialize for NodeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeKey {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── The Store ─────────────────────────────────────────────────────

/// One node's properties and outgoing relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    kind: NodeKind,
    properties: BTreeMap<Property, PropertyValue>,
    relations: BTreeSet<(RelationKind, NodeKey)>,
}

impl NodeRecord {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            properties: BTreeMap::new(),
            relations: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn property(&self, property: Property) -> Option<&PropertyValue> {
        self.properties.get(&property)
    }

    pub fn properties(&self) -> impl Iterator<Item = (Property, &PropertyValue)> {
        self.properties.iter().map(|(p, v)| (*p, v))
    }

    pub fn relations(&self) -> impl Iterator<Item = (RelationKind, &NodeKey)> {
        self.relations.iter().map(|(r, t)| (*r, t))
    }

    pub fn has_relation(&self, relation: RelationKind, target: &NodeKey) -> bool {
        self.relations.contains(&(relation, target.clone()))
    }
}

/// The node+relation store for one scan.
///
/// `BTreeMap`/`BTreeSet` keep iteration order canonical, so two graphs
/// with the same content serialize identically regardless of insertion
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyGraph {
    nodes: BTreeMap<NodeKey, NodeRecord>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the node if absent; its kind comes from the key.
    pub fn ensure(&mut self, key: &NodeKey) -> &mut NodeRecord {
        self.nodes
            .entry(key.clone())
            .or_insert_with(|| NodeRecord::new(key.kind()))
    }

    /// Overwrite a single-valued property. The previous value for this
    /// (node, property) pair, if any, is discarded.
    pub fn set_property(&mut self, key: &NodeKey, property: Property, value: PropertyValue) {
        self.ensure(key).properties.insert(property, value);
    }

    /// Append a relation. Duplicate triples are idempotent; a different
    /// target under the same relation kind is retained alongside the
    /// existing ones. Relation targets need not exist as nodes yet.
    pub fn add_relation(
        &mut self,
        subject: &NodeKey,
        relation: RelationKind,
        target: NodeKey,
    ) -> Result<()> {
        if !subject.kind().allows(relation) {
            return Err(GraphError::RelationNotApplicable {
                relation,
                kind: subject.kind(),
                subject: subject.clone(),
            });
        }
        self.ensure(subject).relations.insert((relation, target));
        Ok(())
    }

    pub fn node(&self, key: &NodeKey) -> Option<&NodeRecord> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&NodeKey, &NodeRecord)> {
        self.nodes.iter()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = (&NodeKey, &NodeRecord)> {
        self.nodes.iter().filter(move |(k, _)| k.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
