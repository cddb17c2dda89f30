//! Rule-based checks over a resolved graph.
//!
//! Rules run independently and in a fixed order. A rule that returns an
//! error or panics contributes no findings; the failure is logged and kept
//! in the report.

mod cycles;
mod rules;

pub use cycles::find_cycles;
pub use rules::{
    AmbiguousGroup, CircularRouting, DanglingOutput, DropPath, MissingConfig, UnknownIndex,
    UnsecuredPipe,
};

use flowmap_model::{CanonicalGraph, Finding, FindingCode, Host, HostTrace, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Indexes every Splunk indexer has without declaring them.
pub const BUILTIN_INDEXES: &[&str] = &[
    "_audit",
    "_internal",
    "_introspection",
    "_metrics",
    "_metrics_rollup",
    "_telemetry",
    "_thefishbucket",
    "history",
    "main",
    "splunklogger",
    "summary",
];

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("host {0} has no traceability record")]
    MissingTrace(String),

    #[error("edge references unknown host {0}")]
    UnknownHost(String),

    #[error("rule panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSettings {
    pub builtin_indexes: BTreeSet<String>,
    pub disabled_rules: BTreeSet<FindingCode>,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            builtin_indexes: BUILTIN_INDEXES.iter().map(|s| s.to_string()).collect(),
            disabled_rules: BTreeSet::new(),
        }
    }
}

/// What a rule sees.
pub struct RuleContext<'g> {
    pub graph: &'g CanonicalGraph,
    pub settings: &'g ValidatorSettings,
    hosts: HashMap<&'g str, &'g Host>,
}

impl<'g> RuleContext<'g> {
    pub fn new(graph: &'g CanonicalGraph, settings: &'g ValidatorSettings) -> Self {
        Self {
            graph,
            settings,
            hosts: graph.host_index(),
        }
    }

    pub fn host(&self, id: &str) -> Result<&'g Host, RuleError> {
        self.hosts
            .get(id)
            .copied()
            .ok_or_else(|| RuleError::UnknownHost(id.to_string()))
    }

    pub fn trace(&self, id: &str) -> Result<&'g HostTrace, RuleError> {
        self.graph
            .meta
            .traceability
            .hosts
            .get(id)
            .ok_or_else(|| RuleError::MissingTrace(id.to_string()))
    }
}

pub trait Rule {
    fn code(&self) -> FindingCode;

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
    /// Rule code to failure message.
    #[serde(default)]
    pub rule_errors: BTreeMap<String, String>,
}

impl ValidationReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn count_code(&self, code: FindingCode) -> usize {
        self.findings.iter().filter(|f| f.code == code).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }
}

pub struct Validator {
    settings: ValidatorSettings,
    rules: Vec<Box<dyn Rule>>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidatorSettings::default())
    }
}

impl Validator {
    /// Validator with every built-in rule, in code order.
    pub fn new(settings: ValidatorSettings) -> Self {
        let rules: Vec<Box<dyn Rule>> = vec![
            Box::new(DanglingOutput),
            Box::new(UnknownIndex),
            Box::new(UnsecuredPipe),
            Box::new(DropPath),
            Box::new(AmbiguousGroup),
            Box::new(MissingConfig),
            Box::new(CircularRouting),
        ];
        Self { settings, rules }
    }

    /// Validator running only `rules`.
    pub fn with_rules(settings: ValidatorSettings, rules: Vec<Box<dyn Rule>>) -> Self {
        Self { settings, rules }
    }

    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    pub fn validate(&self, graph: &CanonicalGraph) -> ValidationReport {
        let ctx = RuleContext::new(graph, &self.settings);
        let mut report = ValidationReport::default();

        for rule in &self.rules {
            let code = rule.code();
            if self.settings.disabled_rules.contains(&code) {
                debug!(rule = %code, "rule disabled");
                continue;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| rule.check(&ctx)))
                .unwrap_or_else(|payload| Err(RuleError::Panicked(panic_message(payload.as_ref()))));

            match outcome {
                Ok(findings) => {
                    debug!(rule = %code, findings = findings.len(), "rule finished");
                    report.findings.extend(findings);
                }
                Err(e) => {
                    warn!(rule = %code, error = %e, "rule failed");
                    report.rule_errors.insert(code.to_string(), e.to_string());
                }
            }
        }

        info!(
            findings = report.findings.len(),
            errors = report.count(Severity::Error),
            warnings = report.count(Severity::Warning),
            rule_errors = report.rule_errors.len(),
            "validation complete"
        );
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
