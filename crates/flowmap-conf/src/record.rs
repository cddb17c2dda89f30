//! Raw records produced by the loader.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::layer::Layer;

/// The `.conf` files the loader reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfKind {
    Inputs,
    Outputs,
    Props,
    Transforms,
    Indexes,
    Server,
}

impl ConfKind {
    pub const ALL: [ConfKind; 6] = [
        ConfKind::Inputs,
        ConfKind::Outputs,
        ConfKind::Props,
        ConfKind::Transforms,
        ConfKind::Indexes,
        ConfKind::Server,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ConfKind::Inputs => "inputs.conf",
            ConfKind::Outputs => "outputs.conf",
            ConfKind::Props => "props.conf",
            ConfKind::Transforms => "transforms.conf",
            ConfKind::Indexes => "indexes.conf",
            ConfKind::Server => "server.conf",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfKind::Inputs => "inputs",
            ConfKind::Outputs => "outputs",
            ConfKind::Props => "props",
            ConfKind::Transforms => "transforms",
            ConfKind::Indexes => "indexes",
            ConfKind::Server => "server",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        ConfKind::ALL.into_iter().find(|k| k.file_name() == name)
    }
}

impl fmt::Display for ConfKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConfKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_end_matches(".conf");
        ConfKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown conf kind: {}", s))
    }
}

/// Where a value came from: snapshot-relative file and 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub file: String,
    pub line: usize,
}

impl Provenance {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One attribute assignment as read from disk, before any merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub kind: ConfKind,
    pub stanza: String,
    pub key: String,
    pub value: String,
    pub layer: Layer,
    pub app: Option<String>,
    pub provenance: Provenance,
}

/// A `[stanza]` header, so stanzas without attributes still exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StanzaHeader {
    pub kind: ConfKind,
    pub stanza: String,
    pub layer: Layer,
    pub app: Option<String>,
    pub provenance: Provenance,
}

/// A malformed line. Never fatal; the line is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{file}:{line}: {reason}")]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    pub fn new(file: &str, line: usize, reason: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            line,
            reason: reason.into(),
        }
    }
}
