//! End-to-end pipeline runs: artifacts, partial loads, input modes

mod fixtures;

use fixtures::Batch;
use flowmap::config::Settings;
use flowmap::pipeline::{
    InputMode, Pipeline, PipelineError, FINDINGS_FILE, GRAPH_FILE, JOB_LOG_FILE, RUN_SUMMARY_FILE,
};
use flowmap::summary::{ExitCode, RunSummary, Status};
use flowmap::{CanonicalGraph, ValidationReport};
use std::fs;
use tempfile::TempDir;

fn pipeline() -> Pipeline {
    Pipeline::new(&Settings::default()).expect("default settings")
}

// =============================================================================
// Artifacts
// =============================================================================

#[test]
fn test_artifacts_written_and_reloadable() {
    let batch = fixtures::forwarding_chain(false);
    let run = fixtures::run(&batch);
    let out = TempDir::new().unwrap();

    run.write_artifacts(out.path()).unwrap();

    let graph = CanonicalGraph::load_from_file(&out.path().join(GRAPH_FILE)).unwrap();
    assert_eq!(graph.digest().unwrap(), run.summary.graph_digest);

    let findings: ValidationReport =
        serde_json::from_str(&fs::read_to_string(out.path().join(FINDINGS_FILE)).unwrap()).unwrap();
    assert_eq!(findings, run.report);

    let summary = RunSummary::from_file(&out.path().join(RUN_SUMMARY_FILE)).unwrap();
    assert_eq!(summary.run_id, run.run_id);
    assert_eq!(summary.host_count, 3);
    assert_eq!(summary.edge_count, 2);
    assert_eq!(summary.findings.warning, 2);

    let log = fs::read_to_string(out.path().join(JOB_LOG_FILE)).unwrap();
    assert!(log.contains("[load]"));
    assert!(log.contains("[resolve] 3 hosts, 2 edges, 0 placeholders"));
    assert!(log.contains("[validate] 2 findings"));
    assert!(log.contains("[summary]"));
}

#[test]
fn test_revalidate_written_graph() {
    let batch = fixtures::null_queue_chain();
    let run = fixtures::run(&batch);
    let out = TempDir::new().unwrap();
    run.write_artifacts(out.path()).unwrap();

    let (graph, report) = pipeline()
        .validate_file(&out.path().join(GRAPH_FILE))
        .unwrap();
    assert_eq!(graph.edges, run.graph.edges);
    assert_eq!(report.findings, run.report.findings);
}

#[test]
fn test_validate_missing_graph_is_graph_error() {
    let dir = TempDir::new().unwrap();
    let err = pipeline()
        .validate_file(&dir.path().join("absent.json"))
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::Graph);
}

// =============================================================================
// Partial and failed loads
// =============================================================================

#[test]
fn test_unreadable_host_degrades_run() {
    let batch = fixtures::forwarding_chain(true);
    batch.write_bytes("broken", "system/local/inputs.conf", b"[monitor:///x]\n\0\0\0");

    let run = fixtures::run(&batch);

    assert_eq!(run.graph.meta.traceability.load.failed_hosts.len(), 1);
    assert!(run.graph.meta.traceability.load.failed_hosts.contains_key("broken"));
    assert_eq!(run.summary.failed_hosts, 1);
    assert_eq!(run.summary.status, Status::Degraded);
    assert_eq!(run.summary.exit_code, ExitCode::PartialLoad.as_i32());
    assert!(run.summary.human_summary.contains("1 host(s) failed to load"));
    // The rest of the batch still resolves.
    assert_eq!(run.graph.edges.len(), 2);
}

#[test]
fn test_malformed_lines_are_skipped() {
    let batch = fixtures::forwarding_chain(true);
    batch.write(
        "idx01",
        "system/local/indexes.conf",
        "[os\nthis line is not an assignment\n",
    );

    let run = fixtures::run(&batch);
    assert_eq!(run.parse_errors.len(), 2);
    assert_eq!(run.summary.parse_errors, 2);
    assert_eq!(run.parse_errors[0].file, "system/local/indexes.conf");
    assert_eq!(run.parse_errors[0].line, 1);
    assert!(run.summary.human_summary.contains("2 malformed line(s) skipped"));
    assert_eq!(run.summary.status, Status::Success);
}

#[test]
fn test_batch_of_only_broken_hosts() {
    let batch = Batch::new();
    batch.write_bytes("broken", "system/local/inputs.conf", b"\0");

    let err = pipeline().run_batch(batch.root()).unwrap_err();
    assert!(matches!(err, PipelineError::NoHostsLoaded { failed: 1, .. }));
    assert_eq!(err.exit_code(), ExitCode::NoHostsLoaded);
}

#[test]
fn test_missing_batch_root() {
    let dir = TempDir::new().unwrap();
    let err = pipeline()
        .run_batch(&dir.path().join("does-not-exist"))
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::BatchUnreadable);
}

// =============================================================================
// Input modes
// =============================================================================

#[test]
fn test_auto_mode_detects_single_snapshot() {
    let batch = fixtures::forwarding_chain(true);

    let run = pipeline()
        .run(&batch.host_dir("uf01"), InputMode::Auto)
        .unwrap();
    assert!(!run.graph.is_placeholder("uf01"));
    assert!(run.graph.is_placeholder("hf01"));
    assert_eq!(run.report.count_code(flowmap::FindingCode::DanglingOutput), 1);

    let run = pipeline().run(batch.root(), InputMode::Auto).unwrap();
    assert_eq!(run.graph.meta.source_hosts.len(), 3);
}

#[test]
fn test_single_host_mode_with_etc_layout() {
    let batch = Batch::new();
    batch.write(
        "splunk",
        "etc/system/local/inputs.conf",
        "[monitor:///var/log/syslog]\nindex = os\n",
    );

    let run = pipeline().run_single(&batch.host_dir("splunk")).unwrap();
    assert_eq!(run.graph.hosts.len(), 1);
    assert_eq!(run.graph.hosts[0].id, "splunk");
    assert!(run.graph.edges.is_empty());
}
