//! Run status, exit codes and `run_summary.json`.

mod run_summary;
mod status;

pub use run_summary::{
    new_run_id, FindingCounts, RunSummary, RUN_SUMMARY_SCHEMA_ID, RUN_SUMMARY_SCHEMA_VERSION,
};
pub use status::{Degradation, ExitCode, Status};
