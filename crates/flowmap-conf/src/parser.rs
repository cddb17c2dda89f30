//! `.conf` text parsing.
//!
//! Handles comments, trailing-backslash continuation, `[stanza]` headers
//! and `key = value` lines. Keys before the first header belong to the
//! `default` stanza. Within one file the last occurrence of a key wins.

use std::collections::HashSet;

use crate::record::ParseError;
use crate::DEFAULT_STANZA;

/// One `key = value` assignment that survived in-file de-duplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfEntry {
    pub stanza: String,
    pub key: String,
    pub value: String,
    pub line: usize,
}

/// Result of parsing one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConf {
    /// Stanza headers in declaration order, first occurrence only.
    pub headers: Vec<(String, usize)>,
    pub entries: Vec<ConfEntry>,
    pub errors: Vec<ParseError>,
}

/// Parse `.conf` text. `file` is only used to label errors.
pub fn parse_conf(text: &str, file: &str) -> ParsedConf {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut parsed = ParsedConf::default();
    let mut seen_headers: HashSet<String> = HashSet::new();
    // None after a broken header: keys are skipped until the next good one.
    let mut current: Option<String> = Some(DEFAULT_STANZA.to_string());

    let mut lines = text.lines().enumerate();
    while let Some((idx, raw)) = lines.next() {
        let line_no = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let mut logical = trimmed.to_string();
        while logical.ends_with('\\') {
            logical.pop();
            match lines.next() {
                Some((_, next)) => {
                    logical.push('\n');
                    logical.push_str(next.trim());
                }
                None => {
                    parsed.errors.push(ParseError::new(
                        file,
                        line_no,
                        "line continuation at end of file",
                    ));
                    break;
                }
            }
        }

        if logical.starts_with('[') {
            match logical.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                Some(name) if !name.trim().is_empty() => {
                    let name = name.trim().to_string();
                    if seen_headers.insert(name.clone()) {
                        parsed.headers.push((name.clone(), line_no));
                    }
                    current = Some(name);
                }
                Some(_) => {
                    parsed
                        .errors
                        .push(ParseError::new(file, line_no, "empty stanza name"));
                    current = None;
                }
                None => {
                    parsed.errors.push(ParseError::new(
                        file,
                        line_no,
                        "unterminated stanza header",
                    ));
                    current = None;
                }
            }
            continue;
        }

        match logical.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                if key.is_empty() {
                    parsed
                        .errors
                        .push(ParseError::new(file, line_no, "empty attribute name"));
                    continue;
                }
                if let Some(stanza) = &current {
                    parsed.entries.push(ConfEntry {
                        stanza: stanza.clone(),
                        key: key.to_string(),
                        value: value.trim().to_string(),
                        line: line_no,
                    });
                }
            }
            None => parsed.errors.push(ParseError::new(
                file,
                line_no,
                format!("expected `key = value`, found {:?}", excerpt(&logical)),
            )),
        }
    }

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut deduped: Vec<ConfEntry> = parsed
        .entries
        .into_iter()
        .rev()
        .filter(|e| seen.insert((e.stanza.clone(), e.key.clone())))
        .collect();
    deduped.reverse();
    parsed.entries = deduped;

    parsed
}

fn excerpt(line: &str) -> String {
    const MAX: usize = 40;
    match line.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}
