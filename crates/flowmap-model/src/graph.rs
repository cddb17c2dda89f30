//! The canonical graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;

use crate::edge::Edge;
use crate::host::{Host, LABEL_INDEXER_DISCOVERY};
use crate::trace::Traceability;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("canonicalization error: {0}")]
    Canonical(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMeta {
    pub generator: String,
    pub generated_at: DateTime<Utc>,
    pub host_count: usize,
    pub edge_count: usize,
    /// Uploaded hosts with input or output stanzas. Sorted.
    pub source_hosts: Vec<String>,
    pub traceability: Traceability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalGraph {
    pub hosts: Vec<Host>,
    pub edges: Vec<Edge>,
    pub meta: GraphMeta,
}

impl CanonicalGraph {
    /// Assemble a graph. Hosts are de-duplicated by id (first wins) and
    /// sorted; edges are sorted by key.
    pub fn new(
        hosts: Vec<Host>,
        mut edges: Vec<Edge>,
        source_hosts: impl IntoIterator<Item = String>,
        generator: impl Into<String>,
        traceability: Traceability,
    ) -> Self {
        let mut by_id: BTreeMap<String, Host> = BTreeMap::new();
        for host in hosts {
            by_id.entry(host.id.clone()).or_insert(host);
        }
        let hosts: Vec<Host> = by_id.into_values().collect();
        edges.sort_by_key(|e| e.key());

        let mut source_hosts: Vec<String> = source_hosts.into_iter().collect();
        source_hosts.sort();
        source_hosts.dedup();

        Self {
            meta: GraphMeta {
                generator: generator.into(),
                generated_at: Utc::now(),
                host_count: hosts.len(),
                edge_count: edges.len(),
                source_hosts,
                traceability,
            },
            hosts,
            edges,
        }
    }

    pub fn host_index(&self) -> HashMap<&str, &Host> {
        self.hosts.iter().map(|h| (h.id.as_str(), h)).collect()
    }

    /// No associated input or output stanzas.
    pub fn is_placeholder(&self, host_id: &str) -> bool {
        self.meta
            .source_hosts
            .binary_search_by(|h| h.as_str().cmp(host_id))
            .is_err()
    }

    /// Placeholder standing for indexer-discovery peers.
    pub fn is_discovery_placeholder(&self, host: &Host) -> bool {
        host.has_label(LABEL_INDEXER_DISCOVERY)
    }

    /// RFC 8785 canonical JSON of the whole graph.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, GraphError> {
        serde_json_canonicalizer::to_vec(self).map_err(|e| GraphError::Canonical(e.to_string()))
    }

    /// SHA-256 of the canonical JSON with `meta.generated_at` removed.
    ///
    /// Identical input yields identical digests across runs.
    pub fn digest(&self) -> Result<String, GraphError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(meta) = value.get_mut("meta").and_then(|m| m.as_object_mut()) {
            meta.remove("generated_at");
        }
        let bytes = serde_json_canonicalizer::to_vec(&value)
            .map_err(|e| GraphError::Canonical(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), GraphError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, GraphError> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::from_json(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{EdgeKey, PathKind, Protocol};
    use crate::host::Role;
    use tempfile::TempDir;

    fn edge(src: &str, dst: &str) -> Edge {
        let mut edge = Edge::new(EdgeKey {
            src_host: src.to_string(),
            dst_host: dst.to_string(),
            protocol: Protocol::Splunktcp,
            path_kind: PathKind::Forwarding,
        });
        edge.weight = 1;
        edge
    }

    fn sample() -> CanonicalGraph {
        CanonicalGraph::new(
            vec![
                Host::new("uf01", [Role::UniversalForwarder], Vec::new(), Vec::new()),
                Host::placeholder("idx99", false),
                Host::new("hf01", [Role::HeavyForwarder], Vec::new(), Vec::new()),
            ],
            vec![edge("uf01", "hf01"), edge("hf01", "idx99")],
            vec!["uf01".to_string(), "hf01".to_string()],
            "flowmap/test",
            Traceability::default(),
        )
    }

    #[test]
    fn test_sorted_and_counted() {
        let graph = sample();
        let ids: Vec<&str> = graph.hosts.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["hf01", "idx99", "uf01"]);
        assert_eq!(graph.edges[0].src_host, "hf01");
        assert_eq!(graph.meta.host_count, 3);
        assert_eq!(graph.meta.edge_count, 2);
        assert_eq!(graph.meta.source_hosts, vec!["hf01", "uf01"]);
    }

    #[test]
    fn test_placeholder_is_derived() {
        let graph = sample();
        assert!(graph.is_placeholder("idx99"));
        assert!(!graph.is_placeholder("uf01"));
    }

    #[test]
    fn test_digest_ignores_generated_at() {
        let a = sample();
        let mut b = sample();
        b.meta.generated_at = a.meta.generated_at + chrono::Duration::seconds(30);

        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert_ne!(a.to_canonical_json().unwrap(), b.to_canonical_json().unwrap());
    }

    #[test]
    fn test_json_roundtrip_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");

        let graph = sample();
        graph.write_to_file(&path).unwrap();
        let loaded = CanonicalGraph::load_from_file(&path).unwrap();
        assert_eq!(loaded.digest().unwrap(), graph.digest().unwrap());
    }
}
