//! flowmap output contract
//!
//! The serialized shapes consumers read: hosts, edges, the canonical graph
//! and validator findings. Field names are stable.

pub mod edge;
pub mod finding;
pub mod graph;
pub mod host;
pub mod trace;

pub use edge::{merge_tls, Confidence, Edge, EdgeKey, PathKind, Protocol};
pub use finding::{Finding, FindingCode, Scalar, Severity};
pub use graph::{CanonicalGraph, GraphError, GraphMeta};
pub use host::{Host, Role, LABEL_INDEXER_DISCOVERY, LABEL_PLACEHOLDER};
pub use trace::{HostTrace, LoadTrace, ResolverStats, Traceability};

/// Generator identifier written into `meta.generator` by default.
pub const GENERATOR: &str = concat!("flowmap/", env!("CARGO_PKG_VERSION"));

/// Prefix of symbolic indexer-discovery placeholder hosts.
pub const DISCOVERY_PREFIX: &str = "indexer_discovery:";

/// Placeholder for outputs that resolve to nothing.
pub const UNKNOWN_DESTINATION: &str = "unknown_destination";
