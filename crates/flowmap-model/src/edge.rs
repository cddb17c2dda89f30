//! Directed host-to-host data paths.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::UNKNOWN_DESTINATION;

/// Wire protocol of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Splunktcp,
    HttpEventCollector,
    Syslog,
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Splunktcp => "splunktcp",
            Protocol::HttpEventCollector => "http_event_collector",
            Protocol::Syslog => "syslog",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }

    /// Protocols expected to be TLS-wrapped between Splunk tiers.
    pub fn expects_tls(&self) -> bool {
        matches!(self, Protocol::Splunktcp | Protocol::HttpEventCollector)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the data entered the source host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    Forwarding,
    Hec,
    Syslog,
    ScriptedInput,
    Modinput,
}

impl PathKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathKind::Forwarding => "forwarding",
            PathKind::Hec => "hec",
            PathKind::Syslog => "syslog",
            PathKind::ScriptedInput => "scripted_input",
            PathKind::Modinput => "modinput",
        }
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Derived` sorts after `Explicit`, so `max` is the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    Explicit,
    Derived,
}

/// Identity of an edge. At most one edge exists per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    pub src_host: String,
    pub dst_host: String,
    pub protocol: Protocol,
    pub path_kind: PathKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub src_host: String,
    pub dst_host: String,
    pub protocol: Protocol,
    pub path_kind: PathKind,
    pub sources: BTreeSet<String>,
    pub sourcetypes: BTreeSet<String>,
    pub indexes: BTreeSet<String>,
    /// First-seen order, no duplicates.
    pub filters: Vec<String>,
    pub drop_rules: BTreeSet<String>,
    pub tls: Option<bool>,
    pub weight: u64,
    pub app_contexts: BTreeSet<String>,
    pub confidence: Confidence,
}

/// `false` if either is false, else `true` if either is true, else unknown.
pub fn merge_tls(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), _) | (_, Some(true)) => Some(true),
        (None, None) => None,
    }
}

impl Edge {
    pub fn new(key: EdgeKey) -> Self {
        Self {
            src_host: key.src_host,
            dst_host: key.dst_host,
            protocol: key.protocol,
            path_kind: key.path_kind,
            sources: BTreeSet::new(),
            sourcetypes: BTreeSet::new(),
            indexes: BTreeSet::new(),
            filters: Vec::new(),
            drop_rules: BTreeSet::new(),
            tls: None,
            weight: 0,
            app_contexts: BTreeSet::new(),
            confidence: Confidence::Explicit,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            src_host: self.src_host.clone(),
            dst_host: self.dst_host.clone(),
            protocol: self.protocol,
            path_kind: self.path_kind,
        }
    }

    pub fn push_filter(&mut self, filter: &str) {
        if !self.filters.iter().any(|f| f == filter) {
            self.filters.push(filter.to_string());
        }
    }

    /// Events on this edge were all null-queued on a host with nowhere to
    /// send them. Nothing is forwarded, so the destination is not dangling.
    pub fn is_discard_only(&self) -> bool {
        self.dst_host == UNKNOWN_DESTINATION && self.indexes.is_empty() && !self.drop_rules.is_empty()
    }

    /// Fold another contribution with the same key into this edge.
    pub fn absorb(&mut self, other: Edge) {
        debug_assert_eq!(self.key(), other.key());
        self.sources.extend(other.sources);
        self.sourcetypes.extend(other.sourcetypes);
        self.indexes.extend(other.indexes);
        for filter in &other.filters {
            self.push_filter(filter);
        }
        self.drop_rules.extend(other.drop_rules);
        self.app_contexts.extend(other.app_contexts);
        self.weight += other.weight;
        self.confidence = self.confidence.max(other.confidence);
        self.tls = merge_tls(self.tls, other.tls);
    }
}
