//! Validator findings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Stable rule codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingCode {
    /// Edge into a placeholder host that is not a discovery placeholder.
    DanglingOutput,
    /// Edge names an index its indexing destination does not declare.
    UnknownIndex,
    /// Splunk-to-Splunk or HEC edge without TLS.
    UnsecuredPipe,
    /// Edge whose data is partly or wholly dropped by a null-queue transform.
    DropPath,
    /// Several tcpout groups and no default.
    AmbiguousGroup,
    /// Inputs whose output configuration resolves to nothing.
    MissingConfig,
    /// Data can loop back to a host it left.
    CircularRouting,
}

impl FindingCode {
    pub const ALL: [FindingCode; 7] = [
        FindingCode::DanglingOutput,
        FindingCode::UnknownIndex,
        FindingCode::UnsecuredPipe,
        FindingCode::DropPath,
        FindingCode::AmbiguousGroup,
        FindingCode::MissingConfig,
        FindingCode::CircularRouting,
    ];

    pub fn severity(&self) -> Severity {
        match self {
            FindingCode::DanglingOutput => Severity::Error,
            FindingCode::UnknownIndex => Severity::Warning,
            FindingCode::UnsecuredPipe => Severity::Warning,
            FindingCode::DropPath => Severity::Info,
            FindingCode::AmbiguousGroup => Severity::Warning,
            FindingCode::MissingConfig => Severity::Error,
            FindingCode::CircularRouting => Severity::Error,
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingOutput => write!(f, "DANGLING_OUTPUT"),
            Self::UnknownIndex => write!(f, "UNKNOWN_INDEX"),
            Self::UnsecuredPipe => write!(f, "UNSECURED_PIPE"),
            Self::DropPath => write!(f, "DROP_PATH"),
            Self::AmbiguousGroup => write!(f, "AMBIGUOUS_GROUP"),
            Self::MissingConfig => write!(f, "MISSING_CONFIG"),
            Self::CircularRouting => write!(f, "CIRCULAR_ROUTING"),
        }
    }
}

impl std::str::FromStr for FindingCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FindingCode::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown finding code: {}", s))
    }
}

/// A context value. Findings never nest objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<&String> for Scalar {
    fn from(v: &String) -> Self {
        Scalar::Str(v.clone())
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<usize> for Scalar {
    fn from(v: usize) -> Self {
        Scalar::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: FindingCode,
    pub message: String,
    pub context: BTreeMap<String, Scalar>,
}

impl Finding {
    /// New finding at the code's fixed severity.
    pub fn new(code: FindingCode, message: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Scalar>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn context_str(&self, key: &str) -> Option<&str> {
        match self.context.get(key) {
            Some(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }
}
