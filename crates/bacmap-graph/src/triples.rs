//! Triple interchange format.
//!
//! The serialized shape other components depend on: every node key is
//! `kind://id`, every predicate is `type`, a property name, or a relation
//! name, and literal objects carry explicit types. Conversion is loss-free
//! in both directions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GraphError, Result};
use crate::model::{NodeKey, NodeKind, Property, PropertyValue, RelationKind, TopologyGraph};

/// A triple predicate: the node's type, a literal property, or a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Predicate {
    Type,
    Property(Property),
    Relation(RelationKind),
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => f.write_str("type"),
            Self::Property(p) => f.write_str(p.as_str()),
            Self::Relation(r) => f.write_str(r.as_str()),
        }
    }
}

impl FromStr for Predicate {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "type" {
            return Ok(Self::Type);
        }
        if let Ok(property) = s.parse::<Property>() {
            return Ok(Self::Property(property));
        }
        if let Ok(relation) = s.parse::<RelationKind>() {
            return Ok(Self::Relation(relation));
        }
        Err(GraphError::Triple(format!("unknown predicate `{s}`")))
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The object position of a triple: a node reference or a typed literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum TripleObject {
    Node(NodeKey),
    Text(String),
    Integer(i64),
    Iri(String),
}

impl From<PropertyValue> for TripleObject {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Text(s) => Self::Text(s),
            PropertyValue::Integer(i) => Self::Integer(i),
            PropertyValue::Iri(s) => Self::Iri(s),
        }
    }
}

impl TryFrom<TripleObject> for PropertyValue {
    type Error = GraphError;

    fn try_from(object: TripleObject) -> Result<Self> {
        match object {
            TripleObject::Text(s) => Ok(Self::Text(s)),
            TripleObject::Integer(i) => Ok(Self::Integer(i)),
            TripleObject::Iri(s) => Ok(Self::Iri(s)),
            TripleObject::Node(key) => Err(GraphError::Triple(format!(
                "node reference {key} is not a literal property value"
            ))),
        }
    }
}

/// One (subject, predicate, object) entry of the interchange graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: NodeKey,
    pub predicate: Predicate,
    pub object: TripleObject,
}

impl Triple {
    pub fn new(subject: NodeKey, predicate: Predicate, object: TripleObject) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl TopologyGraph {
    /// Serialize to canonically ordered triples: one `type` triple per
    /// node, then its properties, then its relations.
    pub fn to_triples(&self) -> Vec<Triple> {
        let mut triples = Vec::new();
        for (key, record) in self.nodes() {
            triples.push(Triple::new(
                key.clone(),
                Predicate::Type,
                TripleObject::Text(record.kind().as_str().to_string()),
            ));
            for (property, value) in record.properties() {
                triples.push(Triple::new(
                    key.clone(),
                    Predicate::Property(property),
                    value.clone().into(),
                ));
            }
            for (relation, target) in record.relations() {
                triples.push(Triple::new(
                    key.clone(),
                    Predicate::Relation(relation),
                    TripleObject::Node(target.clone()),
                ));
            }
        }
        triples
    }

    /// Rebuild a graph from triples. Malformed input is a structured
    /// error, never a panic.
    pub fn from_triples<I>(triples: I) -> Result<Self>
    where
        I: IntoIterator<Item = Triple>,
    {
        let mut graph = TopologyGraph::new();
        for triple in triples {
            match (triple.predicate, triple.object) {
                (Predicate::Type, TripleObject::Text(name)) => {
                    let kind: NodeKind = name.parse()?;
                    if kind != triple.subject.kind() {
                        return Err(GraphError::Triple(format!(
                            "type `{name}` does not match subject {}",
                            triple.subject
                        )));
                    }
                    graph.ensure(&triple.subject);
                }
                (Predicate::Type, object) => {
                    return Err(GraphError::Triple(format!(
                        "type triple for {} has non-text object {object:?}",
                        triple.subject
                    )));
                }
                (Predicate::Property(property), object) => {
                    let value = PropertyValue::try_from(object)?;
                    graph.set_property(&triple.subject, property, value);
                }
                (Predicate::Relation(relation), TripleObject::Node(target)) => {
                    graph.add_relation(&triple.subject, relation, target)?;
                }
                (Predicate::Relation(relation), object) => {
                    return Err(GraphError::Triple(format!(
                        "relation `{relation}` of {} has non-node object {object:?}",
                        triple.subject
                    )));
                }
            }
        }
        Ok(graph)
    }
}
