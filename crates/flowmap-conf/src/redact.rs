//! Load-time redaction of sensitive attribute values.

use serde::{Deserialize, Serialize};

/// Placeholder written in place of a sensitive value.
pub const REDACTED: &str = "<REDACTED>";

/// Attribute-name markers treated as sensitive unless configured otherwise.
pub const DEFAULT_MARKERS: &[&str] = &[
    "password",
    "pass4symmkey",
    "token",
    "secret",
    "privatekey",
    "credential",
];

/// Which attribute names are sensitive and what replaces their values.
///
/// A name is sensitive when its lower-cased form contains any marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionPolicy {
    markers: Vec<String>,
    placeholder: String,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().copied(), REDACTED)
    }
}

impl RedactionPolicy {
    pub fn new<I, S>(markers: I, placeholder: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut markers: Vec<String> = markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        markers.sort();
        markers.dedup();
        Self {
            markers,
            placeholder: placeholder.into(),
        }
    }

    /// A policy that redacts nothing.
    pub fn none() -> Self {
        Self::new(std::iter::empty::<&str>(), REDACTED)
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let lower = key.to_lowercase();
        self.markers.iter().any(|m| lower.contains(m.as_str()))
    }

    /// Returns the value to store and whether it was redacted.
    pub fn apply(&self, key: &str, value: String) -> (String, bool) {
        if self.is_sensitive(key) && !value.is_empty() {
            (self.placeholder.clone(), true)
        } else {
            (value, false)
        }
    }
}
