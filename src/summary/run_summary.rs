//! Run summary (run_summary.json)

use chrono::{DateTime, Utc};
use flowmap_model::{CanonicalGraph, Severity};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use ulid::Ulid;

use super::status::{Degradation, ExitCode, Status};
use crate::validator::ValidationReport;

/// Schema version for run_summary.json
pub const RUN_SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for run_summary.json
pub const RUN_SUMMARY_SCHEMA_ID: &str = "flowmap/run_summary@1";

/// Lower-case ULID, sortable by creation time.
pub fn new_run_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl FindingCounts {
    pub fn from_report(report: &ValidationReport) -> Self {
        Self {
            error: report.count(Severity::Error),
            warning: report.count(Severity::Warning),
            info: report.count(Severity::Info),
        }
    }

    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub schema_id: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub status: Status,
    pub exit_code: i32,
    pub host_count: usize,
    /// Hosts with real configuration, as opposed to placeholders.
    pub source_host_count: usize,
    pub edge_count: usize,
    pub findings: FindingCounts,
    pub rule_errors: usize,
    pub parse_errors: usize,
    pub failed_hosts: usize,
    /// Empty when no graph was produced.
    pub graph_digest: String,
    pub duration_ms: u64,
    pub human_summary: String,
}

impl RunSummary {
    /// Summarize a run that produced a graph.
    pub fn from_run(
        run_id: String,
        graph: &CanonicalGraph,
        report: &ValidationReport,
        graph_digest: String,
        duration_ms: u64,
    ) -> Self {
        let load = &graph.meta.traceability.load;
        let findings = FindingCounts::from_report(report);

        let mut degradation = Degradation::default();
        if !load.failed_hosts.is_empty() {
            degradation.note(ExitCode::PartialLoad);
        }
        if !report.rule_errors.is_empty() {
            degradation.note(ExitCode::RuleFailed);
        }
        if findings.error > 0 {
            degradation.note(ExitCode::ErrorFindings);
        }

        let mut summary = Self {
            schema_version: RUN_SUMMARY_SCHEMA_VERSION,
            schema_id: RUN_SUMMARY_SCHEMA_ID.to_string(),
            run_id,
            created_at: Utc::now(),
            status: degradation.status(),
            exit_code: degradation.exit_code().as_i32(),
            host_count: graph.meta.host_count,
            source_host_count: graph.meta.source_hosts.len(),
            edge_count: graph.meta.edge_count,
            findings,
            rule_errors: report.rule_errors.len(),
            parse_errors: load.parse_errors,
            failed_hosts: load.failed_hosts.len(),
            graph_digest,
            duration_ms,
            human_summary: String::new(),
        };
        summary.human_summary = summary.generate_human_summary();
        summary
    }

    /// Summarize a run that stopped before a graph existed.
    pub fn failed(run_id: String, exit_code: ExitCode, reason: &str, duration_ms: u64) -> Self {
        Self {
            schema_version: RUN_SUMMARY_SCHEMA_VERSION,
            schema_id: RUN_SUMMARY_SCHEMA_ID.to_string(),
            run_id,
            created_at: Utc::now(),
            status: Status::Failed,
            exit_code: exit_code.as_i32(),
            host_count: 0,
            source_host_count: 0,
            edge_count: 0,
            findings: FindingCounts::default(),
            rule_errors: 0,
            parse_errors: 0,
            failed_hosts: 0,
            graph_digest: String::new(),
            duration_ms,
            human_summary: format!("Run failed: {}", reason),
        }
    }

    fn generate_human_summary(&self) -> String {
        let mut text = format!(
            "{} hosts ({} configured), {} edges, {} findings ({} error, {} warning, {} info)",
            self.host_count,
            self.source_host_count,
            self.edge_count,
            self.findings.total(),
            self.findings.error,
            self.findings.warning,
            self.findings.info,
        );
        if self.failed_hosts > 0 {
            text.push_str(&format!("; {} host(s) failed to load", self.failed_hosts));
        }
        if self.rule_errors > 0 {
            text.push_str(&format!("; {} rule(s) failed", self.rule_errors));
        }
        if self.parse_errors > 0 {
            text.push_str(&format!("; {} malformed line(s) skipped", self.parse_errors));
        }
        text
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }

    pub fn from_file(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e)))
    }
}
