//! Batch discovery and per-host loading.
//!
//! A batch root holds one host snapshot per immediate subdirectory. Each
//! host loads in isolation: a fatal [`flowmap_conf::LoadError`] is recorded against its
//! directory and the rest of the batch continues.

use flowmap_conf::{ConfigLoader, HostConfig, ParseError, PrecedenceMerger};
use flowmap_model::LoadTrace;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("batch root not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to list batch root {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Hosts that loaded, plus what went wrong with the rest.
#[derive(Debug, Clone, Default)]
pub struct LoadedBatch {
    pub hosts: Vec<HostConfig>,
    pub load: LoadTrace,
    pub parse_errors: Vec<ParseError>,
}

impl LoadedBatch {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// True when `dir` is itself a host snapshot rather than a batch of them.
pub fn looks_like_snapshot(dir: &Path) -> bool {
    ["system", "apps", "etc/system", "etc/apps"]
        .iter()
        .any(|rel| dir.join(rel).is_dir())
}

/// Immediate non-hidden subdirectories of `root`, sorted by name.
pub fn discover_host_dirs(root: &Path) -> Result<Vec<PathBuf>, BatchError> {
    if !root.is_dir() {
        return Err(BatchError::NotFound(root.to_path_buf()));
    }
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| BatchError::Unreadable {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type().is_dir() && !hidden {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// Loads and merges host snapshots.
#[derive(Debug, Clone, Default)]
pub struct BatchLoader {
    loader: ConfigLoader,
    merger: PrecedenceMerger,
}

impl BatchLoader {
    pub fn new(loader: ConfigLoader, merger: PrecedenceMerger) -> Self {
        Self { loader, merger }
    }

    /// Load every host snapshot under `root`.
    pub fn load_batch(&self, root: &Path) -> Result<LoadedBatch, BatchError> {
        let dirs = discover_host_dirs(root)?;
        info!(root = %root.display(), hosts = dirs.len(), "discovered host snapshots");
        Ok(self.load_dirs(&dirs))
    }

    /// Load `root` as a single host snapshot.
    pub fn load_single(&self, root: &Path) -> Result<LoadedBatch, BatchError> {
        if !root.is_dir() {
            return Err(BatchError::NotFound(root.to_path_buf()));
        }
        Ok(self.load_dirs(&[root.to_path_buf()]))
    }

    pub fn load_dirs(&self, dirs: &[PathBuf]) -> LoadedBatch {
        let mut batch = LoadedBatch::default();
        let mut seen_ids = BTreeSet::new();

        for dir in dirs {
            let dir_name = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| dir.display().to_string());

            let snapshot = match self.loader.load_host(dir) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(host_dir = %dir_name, error = %err, "host failed to load");
                    batch.load.failed_hosts.insert(dir_name, err.to_string());
                    continue;
                }
            };
            batch.load.files += snapshot.files.len();
            batch.load.redacted_values += snapshot.redacted;
            let mut host = HostConfig::from_snapshot(&snapshot, &self.merger);
            batch.parse_errors.extend(snapshot.parse_errors);

            if !seen_ids.insert(host.id.clone()) {
                let renamed = format!("{}-{}", host.id, host.dir_name);
                warn!(host = %host.id, renamed = %renamed, "duplicate host id");
                host.id = renamed;
                seen_ids.insert(host.id.clone());
            }
            batch.hosts.push(host);
        }

        batch.load.parse_errors = batch.parse_errors.len();
        debug!(
            hosts = batch.hosts.len(),
            failed = batch.load.failed_hosts.len(),
            parse_errors = batch.load.parse_errors,
            "batch loaded"
        );
        batch
    }
}
