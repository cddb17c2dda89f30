//! Per-attribute provenance for one stanza of one host.

use flowmap_conf::{ConfKind, ConfigLoader, Layer, LoadError, PrecedenceMerger};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeExplanation {
    pub key: String,
    pub value: String,
    pub layer: Layer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    /// `file:line` of the winning assignment.
    pub location: String,
    /// Lower-precedence assignments of the same key.
    pub overridden: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StanzaExplanation {
    pub host_dir: String,
    pub kind: ConfKind,
    pub stanza: String,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_at: Option<String>,
    pub attributes: Vec<AttributeExplanation>,
}

impl StanzaExplanation {
    pub fn render(&self) -> String {
        let mut out = format!("{}:[{}] on {}", self.kind, self.stanza, self.host_dir);
        if let Some(at) = &self.declared_at {
            let _ = write!(out, " (declared at {})", at);
        }
        out.push('\n');
        if self.disabled {
            out.push_str("  disabled; dropped from the merged configuration\n");
            return out;
        }
        let width = self.attributes.iter().map(|a| a.key.len()).max().unwrap_or(0);
        for attr in &self.attributes {
            let _ = write!(
                out,
                "  {:width$} = {}  [{}{}] {}",
                attr.key,
                attr.value,
                attr.layer.as_str(),
                attr.app.as_deref().map(|a| format!(" {}", a)).unwrap_or_default(),
                attr.location,
                width = width,
            );
            if attr.overridden > 0 {
                let _ = write!(out, " (overrides {})", attr.overridden);
            }
            out.push('\n');
        }
        out
    }
}

/// Explain how `stanza` of `kind` resolves on the host snapshot at `host_dir`.
///
/// `Ok(None)` when no layer mentions the stanza.
pub fn explain_stanza(
    loader: &ConfigLoader,
    merger: &PrecedenceMerger,
    host_dir: &Path,
    kind: ConfKind,
    stanza: &str,
) -> Result<Option<StanzaExplanation>, LoadError> {
    let snapshot = loader.load_host(host_dir)?;
    let merged = merger.merge_snapshot(&snapshot);

    let disabled = merged
        .disabled
        .iter()
        .any(|(k, name)| *k == kind && name == stanza);
    let Some(found) = merged.get(kind, stanza) else {
        if !disabled {
            return Ok(None);
        }
        return Ok(Some(StanzaExplanation {
            host_dir: snapshot.dir_name,
            kind,
            stanza: stanza.to_string(),
            disabled,
            declared_at: None,
            attributes: Vec::new(),
        }));
    };

    let attributes = found
        .attributes
        .iter()
        .map(|(key, attr)| {
            let candidates = snapshot
                .records
                .iter()
                .filter(|r| r.kind == kind && r.stanza == stanza && &r.key == key)
                .count();
            AttributeExplanation {
                key: key.clone(),
                value: attr.value.clone(),
                layer: attr.layer,
                app: attr.app.clone(),
                location: attr.provenance.to_string(),
                overridden: candidates.saturating_sub(1),
            }
        })
        .collect();

    Ok(Some(StanzaExplanation {
        host_dir: snapshot.dir_name,
        kind,
        stanza: stanza.to_string(),
        disabled: false,
        declared_at: found.declared_at.as_ref().map(|p| p.to_string()),
        attributes,
    }))
}
