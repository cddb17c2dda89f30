//! Attribute-level precedence merge.
//!
//! Candidates for one `(kind, stanza, key)` are ordered by
//! `(layer, app load order, file path, line)`; the last one wins.
//! Stanzas whose effective `disabled` is true are dropped.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::layer::{AppOrder, Layer};
use crate::loader::HostSnapshot;
use crate::record::{ConfKind, Provenance, RawRecord, StanzaHeader};
use crate::stanza::parse_bool;

/// The winning value of one attribute, with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub value: String,
    pub layer: Layer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    pub provenance: Provenance,
}

impl AttributeValue {
    fn from_record(record: &RawRecord) -> Self {
        Self {
            value: record.value.clone(),
            layer: record.layer,
            app: record.app.clone(),
            provenance: record.provenance.clone(),
        }
    }
}

/// A stanza after merging, before typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedStanza {
    pub kind: ConfKind,
    pub name: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Highest-precedence header that declared the stanza, if any.
    pub declared_at: Option<Provenance>,
}

impl MergedStanza {
    fn new(kind: ConfKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            attributes: BTreeMap::new(),
            declared_at: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|a| a.value.as_str())
    }

    pub fn is_disabled(&self) -> bool {
        self.get("disabled").and_then(parse_bool).unwrap_or(false)
    }
}

/// One host's merged configuration.
#[derive(Debug, Clone, Default)]
pub struct MergedConfig {
    pub stanzas: BTreeMap<(ConfKind, String), MergedStanza>,
    /// Stanzas removed because their effective `disabled` was true.
    pub disabled: Vec<(ConfKind, String)>,
}

impl MergedConfig {
    pub fn get(&self, kind: ConfKind, name: &str) -> Option<&MergedStanza> {
        self.stanzas.get(&(kind, name.to_string()))
    }

    pub fn of_kind(&self, kind: ConfKind) -> impl Iterator<Item = &MergedStanza> {
        self.stanzas
            .iter()
            .filter(move |((k, _), _)| *k == kind)
            .map(|(_, s)| s)
    }
}

/// Resolves per-attribute precedence for one host.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecedenceMerger {
    app_order: AppOrder,
}

impl PrecedenceMerger {
    pub fn new(app_order: AppOrder) -> Self {
        Self { app_order }
    }

    pub fn merge_snapshot(&self, snapshot: &HostSnapshot) -> MergedConfig {
        self.merge(&snapshot.headers, &snapshot.records)
    }

    /// Merge one host's headers and records. Input order is irrelevant.
    pub fn merge(&self, headers: &[StanzaHeader], records: &[RawRecord]) -> MergedConfig {
        let mut stanzas: BTreeMap<(ConfKind, String), MergedStanza> = BTreeMap::new();

        let mut ordered_headers: Vec<&StanzaHeader> = headers.iter().collect();
        ordered_headers.sort_by(|a, b| {
            self.compare(
                (a.layer, a.app.as_deref(), &a.provenance),
                (b.layer, b.app.as_deref(), &b.provenance),
            )
        });
        for header in ordered_headers {
            stanzas
                .entry((header.kind, header.stanza.clone()))
                .or_insert_with(|| MergedStanza::new(header.kind, &header.stanza))
                .declared_at = Some(header.provenance.clone());
        }

        let mut ordered: Vec<&RawRecord> = records.iter().collect();
        ordered.sort_by(|a, b| self.precedence(a, b));
        for record in ordered {
            stanzas
                .entry((record.kind, record.stanza.clone()))
                .or_insert_with(|| MergedStanza::new(record.kind, &record.stanza))
                .attributes
                .insert(record.key.clone(), AttributeValue::from_record(record));
        }

        let disabled: Vec<(ConfKind, String)> = stanzas
            .iter()
            .filter(|(_, s)| s.is_disabled())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &disabled {
            debug!(kind = %key.0, stanza = %key.1, "dropping disabled stanza");
            stanzas.remove(key);
        }

        MergedConfig { stanzas, disabled }
    }

    /// Total precedence order over records; `Greater` wins.
    pub fn precedence(&self, a: &RawRecord, b: &RawRecord) -> Ordering {
        self.compare(
            (a.layer, a.app.as_deref(), &a.provenance),
            (b.layer, b.app.as_deref(), &b.provenance),
        )
    }

    fn compare(
        &self,
        (a_layer, a_app, a_prov): (Layer, Option<&str>, &Provenance),
        (b_layer, b_app, b_prov): (Layer, Option<&str>, &Provenance),
    ) -> Ordering {
        a_layer
            .cmp(&b_layer)
            .then_with(|| self.app_order.compare(a_app, b_app))
            .then_with(|| a_prov.file.cmp(&b_prov.file))
            .then_with(|| a_prov.line.cmp(&b_prov.line))
    }
}
