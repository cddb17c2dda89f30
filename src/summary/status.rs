//! Run status and the process exit codes flowmap promises to keep.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    /// A graph exists, but hosts failed to load, a rule failed or an
    /// error-severity finding was raised.
    Degraded,
    /// The run stopped before a graph existed.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    #[default]
    Success = 0,
    ErrorFindings = 10,
    RuleFailed = 11,
    PartialLoad = 20,
    /// Settings file missing or invalid.
    Config = 30,
    NoHostsLoaded = 40,
    BatchUnreadable = 41,
    /// Artifact directory not writable.
    Io = 50,
    /// graph.json unreadable or not serializable.
    Graph = 60,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }
}

/// Tracks why a run that produced a graph is degraded. The first reason
/// noted decides the exit code, so callers note them in priority order.
#[derive(Debug, Default)]
pub struct Degradation {
    first: Option<ExitCode>,
}

impl Degradation {
    pub fn note(&mut self, exit_code: ExitCode) {
        self.first.get_or_insert(exit_code);
    }

    pub fn status(&self) -> Status {
        match self.first {
            Some(_) => Status::Degraded,
            None => Status::Success,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.first.unwrap_or_default()
    }
}
