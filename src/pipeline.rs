//! Pipeline orchestration
//!
//! One run over a batch (or a single host snapshot):
//! - Load and merge every host
//! - Resolve the canonical graph
//! - Validate it
//! - Summarize, and optionally write artifacts

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use flowmap_conf::{ConfigLoader, ParseError, PrecedenceMerger};
use flowmap_model::{CanonicalGraph, GraphError};
use thiserror::Error;
use tracing::{info, warn};

use crate::batch::{looks_like_snapshot, BatchError, BatchLoader, LoadedBatch};
use crate::config::{ConfigError, Settings};
use crate::resolver::Resolver;
use crate::summary::{new_run_id, ExitCode, RunSummary};
use crate::validator::{ValidationReport, Validator};

pub const GRAPH_FILE: &str = "graph.json";
pub const FINDINGS_FILE: &str = "findings.json";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";
pub const JOB_LOG_FILE: &str = "job.log";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("no host snapshot under {root} could be loaded ({failed} failed)")]
    NoHostsLoaded { root: PathBuf, failed: usize },

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            PipelineError::Config(_) => ExitCode::Config,
            PipelineError::Batch(_) => ExitCode::BatchUnreadable,
            PipelineError::NoHostsLoaded { .. } => ExitCode::NoHostsLoaded,
            PipelineError::Graph(_) => ExitCode::Graph,
            PipelineError::Io(_) => ExitCode::Io,
            PipelineError::Serialization(_) => ExitCode::Graph,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// How the input path is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Single snapshot when the path looks like one, else a batch.
    #[default]
    Auto,
    Batch,
    SingleHost,
}

/// Timestamped, human-readable record of one run (`job.log`).
#[derive(Debug, Clone, Default)]
pub struct JobLog {
    lines: Vec<String>,
}

impl JobLog {
    pub fn record(&mut self, stage: &str, message: impl AsRef<str>) {
        self.lines.push(format!(
            "{} [{}] {}",
            Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            stage,
            message.as_ref()
        ));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn to_text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub graph: CanonicalGraph,
    pub report: ValidationReport,
    pub parse_errors: Vec<ParseError>,
    pub summary: RunSummary,
    pub job_log: JobLog,
}

impl RunReport {
    /// Write `graph.json`, `findings.json`, `run_summary.json` and `job.log`.
    pub fn write_artifacts(&self, out_dir: &Path) -> PipelineResult<()> {
        fs::create_dir_all(out_dir)?;
        self.graph.write_to_file(&out_dir.join(GRAPH_FILE))?;
        fs::write(
            out_dir.join(FINDINGS_FILE),
            serde_json::to_string_pretty(&self.report)?,
        )?;
        self.summary.write_to_file(&out_dir.join(RUN_SUMMARY_FILE))?;
        fs::write(out_dir.join(JOB_LOG_FILE), self.job_log.to_text())?;
        info!(out_dir = %out_dir.display(), "artifacts written");
        Ok(())
    }
}

pub struct Pipeline {
    loader: BatchLoader,
    resolver: Resolver,
    validator: Validator,
}

impl Pipeline {
    pub fn new(settings: &Settings) -> PipelineResult<Self> {
        let loader = BatchLoader::new(
            ConfigLoader::new(settings.redaction_policy()),
            PrecedenceMerger::new(settings.app_order),
        );
        Ok(Self {
            loader,
            resolver: Resolver::new(settings.resolver_settings()),
            validator: Validator::new(settings.validator_settings()?),
        })
    }

    pub fn run(&self, path: &Path, mode: InputMode) -> PipelineResult<RunReport> {
        let start = Instant::now();
        let run_id = new_run_id();
        let mut job_log = JobLog::default();

        let single = match mode {
            InputMode::SingleHost => true,
            InputMode::Batch => false,
            InputMode::Auto => looks_like_snapshot(path),
        };
        job_log.record(
            "load",
            format!(
                "run {} loading {} as {}",
                run_id,
                path.display(),
                if single { "a single host" } else { "a batch" }
            ),
        );

        let batch = if single {
            self.loader.load_single(path)?
        } else {
            self.loader.load_batch(path)?
        };
        record_load(&mut job_log, &batch);

        if batch.is_empty() {
            let failed = batch.load.failed_hosts.len();
            job_log.record("load", "no host loaded; stopping");
            return Err(PipelineError::NoHostsLoaded {
                root: path.to_path_buf(),
                failed,
            });
        }

        let LoadedBatch {
            hosts,
            load,
            parse_errors,
        } = batch;
        let graph = self.resolver.resolve(&hosts, load);
        job_log.record(
            "resolve",
            format!(
                "{} hosts, {} edges, {} placeholders",
                graph.meta.host_count,
                graph.meta.edge_count,
                graph.meta.traceability.resolver.placeholder_count
            ),
        );

        let report = self.validator.validate(&graph);
        for (rule, error) in &report.rule_errors {
            job_log.record("validate", format!("rule {} failed: {}", rule, error));
        }
        job_log.record(
            "validate",
            format!("{} findings", report.findings.len()),
        );

        let digest = graph.digest()?;
        let summary = RunSummary::from_run(
            run_id.clone(),
            &graph,
            &report,
            digest,
            start.elapsed().as_millis() as u64,
        );
        job_log.record("summary", &summary.human_summary);
        info!(run_id = %run_id, status = ?summary.status, "{}", summary.human_summary);

        Ok(RunReport {
            run_id,
            graph,
            report,
            parse_errors,
            summary,
            job_log,
        })
    }

    pub fn run_batch(&self, root: &Path) -> PipelineResult<RunReport> {
        self.run(root, InputMode::Batch)
    }

    pub fn run_single(&self, root: &Path) -> PipelineResult<RunReport> {
        self.run(root, InputMode::SingleHost)
    }

    /// Re-validate a graph written by an earlier run.
    pub fn validate_file(&self, graph_path: &Path) -> PipelineResult<(CanonicalGraph, ValidationReport)> {
        let graph = CanonicalGraph::load_from_file(graph_path)?;
        let report = self.validator.validate(&graph);
        Ok((graph, report))
    }
}

fn record_load(job_log: &mut JobLog, batch: &LoadedBatch) {
    job_log.record(
        "load",
        format!(
            "{} hosts loaded from {} files, {} values redacted",
            batch.hosts.len(),
            batch.load.files,
            batch.load.redacted_values
        ),
    );
    for (dir, reason) in &batch.load.failed_hosts {
        job_log.record("load", format!("host {} failed: {}", dir, reason));
    }
    for err in &batch.parse_errors {
        job_log.record("parse", format!("skipped {}", err));
    }
    if !batch.parse_errors.is_empty() {
        warn!(count = batch.parse_errors.len(), "malformed lines skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pipeline_error_exit_codes() {
        let err = PipelineError::NoHostsLoaded {
            root: PathBuf::from("/x"),
            failed: 2,
        };
        assert_eq!(err.exit_code(), ExitCode::NoHostsLoaded);
        assert_eq!(
            PipelineError::Config(ConfigError::ValidationError("x".into())).exit_code(),
            ExitCode::Config
        );
        assert_eq!(
            PipelineError::Batch(BatchError::NotFound(PathBuf::from("/x"))).exit_code(),
            ExitCode::BatchUnreadable
        );
    }

    #[test]
    fn test_job_log_lines() {
        let mut log = JobLog::default();
        log.record("load", "2 hosts");
        log.record("resolve", "3 edges");

        assert_eq!(log.lines().len(), 2);
        assert!(log.lines()[0].ends_with("[load] 2 hosts"));
        assert!(log.to_text().ends_with("[resolve] 3 edges\n"));
    }

    #[test]
    fn test_empty_batch_fails() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(&Settings::default()).unwrap();

        let err = pipeline.run_batch(dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::NoHostsLoaded { failed: 0, .. }));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = Settings::default();
        settings.validator.disabled_rules = vec!["BOGUS".to_string()];
        assert!(matches!(Pipeline::new(&settings), Err(PipelineError::Config(_))));
    }
}
