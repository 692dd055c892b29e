//! Error types for the bacmap-graph crate.

use thiserror::Error;

use crate::model::{NodeKey, NodeKind, RelationKind};

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("relation {relation} is not applicable to {kind} node {subject}")]
    RelationNotApplicable {
        relation: RelationKind,
        kind: NodeKind,
        subject: NodeKey,
    },

    #[error("malformed node key: {0}")]
    Key(String),

    #[error("malformed triple: {0}")]
    Triple(String),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
