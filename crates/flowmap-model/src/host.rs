//! Hosts in the graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const LABEL_PLACEHOLDER: &str = "placeholder";
pub const LABEL_INDEXER_DISCOVERY: &str = "indexer_discovery";

/// Inferred function of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Indexer,
    HeavyForwarder,
    UniversalForwarder,
    HecReceiver,
    ClusterManager,
    ClusterPeer,
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Indexer => "indexer",
            Role::HeavyForwarder => "heavy_forwarder",
            Role::UniversalForwarder => "universal_forwarder",
            Role::HecReceiver => "hec_receiver",
            Role::ClusterManager => "cluster_manager",
            Role::ClusterPeer => "cluster_peer",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    /// Sorted.
    pub roles: Vec<String>,
    /// Sorted.
    pub labels: Vec<String>,
    /// Sorted.
    pub apps: Vec<String>,
}

impl Host {
    pub fn new<R, L, A>(id: impl Into<String>, roles: R, labels: L, apps: A) -> Self
    where
        R: IntoIterator<Item = Role>,
        L: IntoIterator<Item = String>,
        A: IntoIterator<Item = String>,
    {
        let mut roles: BTreeSet<String> = roles.into_iter().map(|r| r.as_str().to_string()).collect();
        if roles.is_empty() {
            roles.insert(Role::Unknown.as_str().to_string());
        }
        Self {
            id: id.into(),
            roles: roles.into_iter().collect(),
            labels: labels.into_iter().collect::<BTreeSet<_>>().into_iter().collect(),
            apps: apps.into_iter().collect::<BTreeSet<_>>().into_iter().collect(),
        }
    }

    /// A destination that was referenced but never uploaded.
    pub fn placeholder(id: impl Into<String>, discovery: bool) -> Self {
        let mut labels = vec![LABEL_PLACEHOLDER.to_string()];
        if discovery {
            labels.push(LABEL_INDEXER_DISCOVERY.to_string());
        }
        Self::new(id, [Role::Unknown], labels, Vec::<String>::new())
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}
