//! Traceability carried in `meta.traceability`.
//!
//! Enough per-host fact for the validator to work from the graph alone, and
//! enough provenance for a consumer to find the stanza behind an edge.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Traceability {
    pub hosts: BTreeMap<String, HostTrace>,
    pub resolver: ResolverStats,
    pub load: LoadTrace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostTrace {
    pub declared_indexes: BTreeSet<String>,
    pub output_groups: BTreeSet<String>,
    pub default_groups: Vec<String>,
    /// tcpout group to indexer-discovery name.
    pub discovery_groups: BTreeMap<String, String>,
    pub input_count: usize,
    pub output_count: usize,
    pub has_output_config: bool,
    /// Distinct destinations the host's outputs resolve to.
    pub resolvable_targets: usize,
    /// Group names referenced but not defined.
    pub dangling_group_refs: BTreeSet<String>,
    pub apps: BTreeSet<String>,
    /// `kind:[stanza]` to `file:line` of winning attributes.
    pub stanzas: BTreeMap<String, Vec<String>>,
    /// Transforms skipped because an earlier one claimed the same attribute.
    pub shadowed_transforms: BTreeSet<String>,
    /// Transform names referenced by props but not defined.
    pub missing_transforms: BTreeSet<String>,
    /// `dst:port` targets without a matching enabled receiver.
    pub unmatched_receivers: BTreeSet<String>,
    pub disabled_stanzas: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverStats {
    /// Inputs per inbound protocol.
    pub input_counts: BTreeMap<String, usize>,
    pub raw_edge_count: usize,
    pub merged_edge_count: usize,
    pub placeholder_count: usize,
    pub propagation_rounds: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadTrace {
    pub files: usize,
    pub parse_errors: usize,
    pub redacted_values: usize,
    /// Snapshot directory to failure reason.
    pub failed_hosts: BTreeMap<String, String>,
}
