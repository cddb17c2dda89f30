//! Snapshot loading: layer discovery, file reads, redaction.
//!
//! Pure extraction. Nothing here decides which value wins.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::layer::Layer;
use crate::parser::parse_conf;
use crate::record::{ConfKind, ParseError, Provenance, RawRecord, StanzaHeader};
use crate::redact::RedactionPolicy;

/// A `.conf` file that contributed records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfFile {
    /// Path relative to the snapshot root, `/`-separated.
    pub path: String,
    pub kind: ConfKind,
    pub layer: Layer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    /// SHA-256 of the raw file bytes.
    pub digest: String,
}

/// Everything read from one host snapshot.
#[derive(Debug, Clone, Default)]
pub struct HostSnapshot {
    /// Name of the snapshot directory; the host id fallback.
    pub dir_name: String,
    pub root: PathBuf,
    pub headers: Vec<StanzaHeader>,
    pub records: Vec<RawRecord>,
    pub parse_errors: Vec<ParseError>,
    pub files: Vec<ConfFile>,
    pub apps: BTreeSet<String>,
    /// Number of values replaced by the redaction placeholder.
    pub redacted: usize,
}

/// Fatal for one host only.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("snapshot root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not a text file: {reason}")]
    NotText { path: PathBuf, reason: String },

    #[error("failed to list {path}: {reason}")]
    Walk { path: PathBuf, reason: String },
}

/// Reads layered `.conf` trees into raw records.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    policy: RedactionPolicy,
}

impl ConfigLoader {
    pub fn new(policy: RedactionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RedactionPolicy {
        &self.policy
    }

    /// Load one host snapshot rooted at `root`.
    ///
    /// A root holding `etc/system` instead of `system` is unwrapped.
    pub fn load_host(&self, root: &Path) -> Result<HostSnapshot, LoadError> {
        if !root.is_dir() {
            return Err(LoadError::RootNotFound(root.to_path_buf()));
        }
        let base = config_base(root);

        let mut snapshot = HostSnapshot {
            dir_name: root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            root: root.to_path_buf(),
            ..HostSnapshot::default()
        };

        let system = base.join("system");
        for layer in [Layer::SystemDefault, Layer::SystemLocal] {
            self.load_layer_dir(root, &system.join(layer.dir_name()), layer, None, &mut snapshot)?;
        }

        for app in list_apps(&base.join("apps"))? {
            let app_dir = base.join("apps").join(&app);
            for layer in [Layer::AppDefault, Layer::AppLocal] {
                self.load_layer_dir(
                    root,
                    &app_dir.join(layer.dir_name()),
                    layer,
                    Some(&app),
                    &mut snapshot,
                )?;
            }
            snapshot.apps.insert(app);
        }

        debug!(
            host_dir = %snapshot.dir_name,
            files = snapshot.files.len(),
            records = snapshot.records.len(),
            parse_errors = snapshot.parse_errors.len(),
            "loaded host snapshot"
        );
        Ok(snapshot)
    }

    fn load_layer_dir(
        &self,
        root: &Path,
        dir: &Path,
        layer: Layer,
        app: Option<&str>,
        snapshot: &mut HostSnapshot,
    ) -> Result<(), LoadError> {
        if !dir.is_dir() {
            return Ok(());
        }
        for kind in ConfKind::ALL {
            let path = dir.join(kind.file_name());
            if path.is_file() {
                self.load_file(root, &path, kind, layer, app, snapshot)?;
            }
        }
        Ok(())
    }

    fn load_file(
        &self,
        root: &Path,
        path: &Path,
        kind: ConfKind,
        layer: Layer,
        app: Option<&str>,
        snapshot: &mut HostSnapshot,
    ) -> Result<(), LoadError> {
        let bytes = fs::read(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        if bytes.contains(&0) {
            return Err(LoadError::NotText {
                path: path.to_path_buf(),
                reason: "contains NUL bytes".to_string(),
            });
        }
        let text = String::from_utf8(bytes).map_err(|e| LoadError::NotText {
            path: path.to_path_buf(),
            reason: format!("invalid UTF-8: {}", e),
        })?;

        let rel = relative_path(root, path);
        let parsed = parse_conf(&text, &rel);
        for err in &parsed.errors {
            warn!(file = %err.file, line = err.line, reason = %err.reason, "skipping malformed line");
        }

        let app = app.map(str::to_string);
        snapshot
            .headers
            .extend(parsed.headers.into_iter().map(|(stanza, line)| StanzaHeader {
                kind,
                stanza,
                layer,
                app: app.clone(),
                provenance: Provenance::new(rel.clone(), line),
            }));

        for entry in parsed.entries {
            let (value, redacted) = self.policy.apply(&entry.key, entry.value);
            if redacted {
                snapshot.redacted += 1;
            }
            snapshot.records.push(RawRecord {
                kind,
                stanza: entry.stanza,
                key: entry.key,
                value,
                layer,
                app: app.clone(),
                provenance: Provenance::new(rel.clone(), entry.line),
            });
        }
        snapshot.parse_errors.extend(parsed.errors);
        snapshot.files.push(ConfFile {
            path: rel,
            kind,
            layer,
            app,
            digest,
        });
        Ok(())
    }
}

/// `root/etc` when the snapshot was taken one level above `etc/`.
fn config_base(root: &Path) -> PathBuf {
    let etc = root.join("etc");
    if !root.join("system").is_dir() && etc.join("system").is_dir() {
        etc
    } else {
        root.to_path_buf()
    }
}

fn list_apps(apps_dir: &Path) -> Result<Vec<String>, LoadError> {
    if !apps_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut apps = Vec::new();
    for entry in WalkDir::new(apps_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| LoadError::Walk {
            path: apps_dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_dir() {
            apps.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    Ok(apps)
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
