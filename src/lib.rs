//! flowmap - resolve layered Splunk configuration into a data-flow graph
//!
//! Host snapshots are loaded and merged by `flowmap-conf`, resolved into a
//! [`CanonicalGraph`] here and checked by the [`Validator`]. The serialized
//! shapes live in `flowmap-model`.

pub mod batch;
pub mod config;
pub mod explain;
pub mod logging;
pub mod pipeline;
pub mod resolver;
pub mod summary;
pub mod validator;

pub use batch::{BatchError, BatchLoader, LoadedBatch};
pub use flowmap_model::{CanonicalGraph, Edge, Finding, FindingCode, Host, Severity};
pub use pipeline::{InputMode, Pipeline, PipelineError, RunReport};
pub use resolver::{Resolver, ResolverSettings};
pub use validator::{ValidationReport, Validator, ValidatorSettings};
