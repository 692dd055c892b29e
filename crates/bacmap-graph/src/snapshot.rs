//! Snapshot files: one serialized topology graph per scan run.
//!
//! A snapshot is the JSON envelope handed to storage, rendering, and
//! diffing. The content hash covers only the canonical triples, so two
//! scans that observed the same topology hash identically even though
//! their envelopes differ.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::model::TopologyGraph;
use crate::triples::Triple;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A serialized topology graph with scan metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub recorded_at: DateTime<Utc>,
    pub scan_id: Uuid,
    pub triples: Vec<Triple>,
}

impl Snapshot {
    /// Capture the graph as it stands, stamped with the scan run's id.
    pub fn capture(graph: &TopologyGraph, scan_id: Uuid) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            recorded_at: Utc::now(),
            scan_id,
            triples: graph.to_triples(),
        }
    }

    /// Rebuild the topology graph. Malformed triples are a structured
    /// error scoped to this call.
    pub fn restore(&self) -> Result<TopologyGraph> {
        TopologyGraph::from_triples(self.triples.iter().cloned())
    }

    /// Blake3 hash of the canonically ordered triples.
    pub fn content_hash(&self) -> Result<String> {
        let mut sorted = self.triples.clone();
        sorted.sort();
        let bytes = serde_json::to_vec(&sorted)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, bytes)?;
        tracing::debug!(path = %path.display(), triples = self.triples.len(), "Snapshot written");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            scan_id = %snapshot.scan_id,
            triples = snapshot.triples.len(),
            "Snapshot loaded"
        );
        Ok(snapshot)
    }
}
