//! Typed stanzas.
//!
//! Every merged stanza becomes exactly one [`Stanza`] variant, chosen by the
//! file it came from. Names that a file does not recognise map to that
//! variant's catch-all classification and keep their attributes.

use regex_lite::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::merge::{AttributeValue, MergedStanza};
use crate::record::{ConfKind, Provenance};
use crate::DEFAULT_STANZA;

/// Splunk boolean spelling.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Comma-separated list, entries trimmed, empties dropped.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shared accessors over a stanza's merged attributes.
pub trait StanzaAttributes {
    fn name(&self) -> &str;

    fn attributes(&self) -> &BTreeMap<String, AttributeValue>;

    fn attr(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes().get(key)
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.attr(key).map(|a| a.value.as_str())
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(parse_bool)
    }

    fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key).map(split_list).unwrap_or_default()
    }

    /// Provenance of every attribute, sorted.
    fn provenance(&self) -> Vec<&Provenance> {
        let mut all: Vec<&Provenance> = self.attributes().values().map(|a| &a.provenance).collect();
        all.sort();
        all.dedup();
        all
    }
}

macro_rules! stanza_attributes {
    ($($ty:ty),*) => {
        $(impl StanzaAttributes for $ty {
            fn name(&self) -> &str {
                &self.name
            }

            fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
                &self.attributes
            }
        })*
    };
}

// ============================================================================
// inputs.conf
// ============================================================================

/// What an `inputs.conf` stanza name declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Monitor { path: String },
    Batch { path: String },
    Tcp { port: Option<u16>, ssl: bool },
    Udp { port: Option<u16> },
    SplunkTcp { port: Option<u16>, ssl: bool },
    /// `http://<token>`; `token: None` is the global `[http]` settings stanza.
    Http { token: Option<String> },
    Script { path: String },
    WinEventLog { channel: String },
    Modular { scheme: String, name: String },
    /// `[default]`, inherited by every other stanza in the file.
    Default,
    /// Settings stanzas without a scheme, such as `[SSL]` or `[splunktcp]`.
    Settings,
}

fn scheme_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([A-Za-z][A-Za-z0-9_.\-]*):(?://)?(.*)$").ok())
        .as_ref()
}

fn parse_port(address: &str) -> Option<u16> {
    address.rsplit(':').next().and_then(|p| p.trim().parse().ok())
}

impl InputKind {
    pub fn parse(name: &str) -> Self {
        if name == DEFAULT_STANZA {
            return InputKind::Default;
        }
        if name.eq_ignore_ascii_case("http") {
            return InputKind::Http { token: None };
        }
        let Some(caps) = scheme_pattern().and_then(|re| re.captures(name)) else {
            return InputKind::Settings;
        };
        let scheme = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let rest = caps.get(2).map(|m| m.as_str()).unwrap_or_default().to_string();

        match scheme.to_lowercase().as_str() {
            "monitor" => InputKind::Monitor { path: rest },
            "batch" => InputKind::Batch { path: rest },
            "tcp" => InputKind::Tcp {
                port: parse_port(&rest),
                ssl: false,
            },
            "tcp-ssl" => InputKind::Tcp {
                port: parse_port(&rest),
                ssl: true,
            },
            "udp" => InputKind::Udp {
                port: parse_port(&rest),
            },
            "splunktcp" => InputKind::SplunkTcp {
                port: parse_port(&rest),
                ssl: false,
            },
            "splunktcp-ssl" => InputKind::SplunkTcp {
                port: parse_port(&rest),
                ssl: true,
            },
            "http" => InputKind::Http {
                token: Some(rest).filter(|t| !t.is_empty()),
            },
            "script" => InputKind::Script { path: rest },
            "wineventlog" => InputKind::WinEventLog { channel: rest },
            _ => InputKind::Modular {
                scheme: scheme.to_string(),
                name: rest,
            },
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            InputKind::Tcp { port, .. } | InputKind::Udp { port } | InputKind::SplunkTcp { port, .. } => *port,
            _ => None,
        }
    }

    /// Receives forwarded Splunk-to-Splunk traffic.
    pub fn is_receiver(&self) -> bool {
        matches!(self, InputKind::SplunkTcp { .. })
    }

    /// Originates data on this host.
    pub fn is_collector(&self) -> bool {
        !matches!(
            self,
            InputKind::SplunkTcp { .. }
                | InputKind::Http { token: None }
                | InputKind::Default
                | InputKind::Settings
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputStanza {
    pub name: String,
    pub kind: InputKind,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl InputStanza {
    /// Fill attributes missing here from the file's `[default]` stanza.
    pub fn inherit(&mut self, defaults: &BTreeMap<String, AttributeValue>) {
        for (key, value) in defaults {
            if key != "disabled" {
                self.attributes
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
    }
}

// ============================================================================
// outputs.conf
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// `[tcpout]`
    Global,
    /// `[tcpout:<group>]`
    Group(String),
    /// `[tcpout-server://<host:port>]`
    Server(String),
    /// `[indexer_discovery:<name>]`
    IndexerDiscovery(String),
    /// `[syslog]`
    SyslogGlobal,
    /// `[syslog:<group>]`
    SyslogGroup(String),
    /// `[httpout]`
    HttpOut,
    Default,
    Other,
}

impl OutputTarget {
    pub fn parse(name: &str) -> Self {
        if let Some(server) = name.strip_prefix("tcpout-server://") {
            return OutputTarget::Server(server.trim().to_string());
        }
        if let Some(group) = name.strip_prefix("tcpout:") {
            return OutputTarget::Group(group.trim().to_string());
        }
        if let Some(disc) = name.strip_prefix("indexer_discovery:") {
            return OutputTarget::IndexerDiscovery(disc.trim().to_string());
        }
        if let Some(group) = name.strip_prefix("syslog:") {
            return OutputTarget::SyslogGroup(group.trim().to_string());
        }
        match name {
            "tcpout" => OutputTarget::Global,
            "syslog" => OutputTarget::SyslogGlobal,
            "httpout" => OutputTarget::HttpOut,
            DEFAULT_STANZA => OutputTarget::Default,
            _ => OutputTarget::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputStanza {
    pub name: String,
    pub target: OutputTarget,
    pub attributes: BTreeMap<String, AttributeValue>,
}

// ============================================================================
// props.conf
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropsPattern {
    Default,
    Sourcetype(String),
    Source(String),
    Host(String),
    /// `rule::` and `delayedrule::` stanzas; never matched.
    Rule(String),
}

impl PropsPattern {
    pub fn parse(name: &str) -> Self {
        if name == DEFAULT_STANZA {
            return PropsPattern::Default;
        }
        if let Some(p) = name.strip_prefix("source::") {
            return PropsPattern::Source(p.to_string());
        }
        if let Some(p) = name.strip_prefix("host::") {
            return PropsPattern::Host(p.to_string());
        }
        if let Some(p) = name.strip_prefix("sourcetype::") {
            return PropsPattern::Sourcetype(p.to_string());
        }
        if name.starts_with("rule::") || name.starts_with("delayedrule::") {
            return PropsPattern::Rule(name.to_string());
        }
        PropsPattern::Sourcetype(name.to_string())
    }

    /// Lower is more specific.
    pub fn specificity(&self) -> u8 {
        match self {
            PropsPattern::Source(p) if !is_wildcard(p) => 0,
            PropsPattern::Source(_) => 1,
            PropsPattern::Host(_) => 2,
            PropsPattern::Sourcetype(_) => 3,
            PropsPattern::Default => 4,
            PropsPattern::Rule(_) => 5,
        }
    }
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[']) || pattern.contains("...")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropsStanza {
    pub name: String,
    pub pattern: PropsPattern,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl PropsStanza {
    /// `TRANSFORMS-<class>` attributes in declaration order.
    pub fn transform_classes(&self) -> Vec<(&str, &AttributeValue)> {
        let mut classes: Vec<(&str, &AttributeValue)> = self
            .attributes
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix("TRANSFORMS-")
                    .or_else(|| (k == "TRANSFORMS").then_some(""))
                    .map(|class| (class, v))
            })
            .collect();
        classes.sort_by(|a, b| a.1.provenance.cmp(&b.1.provenance).then(a.0.cmp(b.0)));
        classes
    }

    /// Transform names in evaluation order, each class's list in order.
    pub fn transform_chain(&self) -> Vec<String> {
        self.transform_classes()
            .into_iter()
            .flat_map(|(_, v)| split_list(&v.value))
            .collect()
    }

    /// Provenance of the first `TRANSFORMS-*` attribute, for tie-breaks.
    pub fn declared_at(&self) -> Option<&Provenance> {
        self.transform_classes().first().map(|(_, v)| &v.provenance)
    }
}

// ============================================================================
// transforms.conf
// ============================================================================

/// What a transform does to the events it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformAction {
    /// Route to `nullQueue`.
    Drop,
    /// Route to a non-null queue, such as `indexQueue`.
    Keep(String),
    SetIndex(String),
    SetSourcetype(String),
    SetHost(String),
    TcpRouting(Vec<String>),
    SyslogRouting(Vec<String>),
    Other,
}

impl TransformAction {
    pub fn from_dest(dest_key: Option<&str>, format: Option<&str>) -> Self {
        let Some(dest) = dest_key.map(str::trim) else {
            return TransformAction::Other;
        };
        let format = format.map(str::trim).unwrap_or_default();
        let is_null = format.eq_ignore_ascii_case("nullQueue");
        let dest_norm = dest.trim_start_matches('_').to_lowercase();

        match dest_norm.as_str() {
            "queue" if is_null => TransformAction::Drop,
            "queue" => TransformAction::Keep(format.to_string()),
            "tcp_routing" if is_null => TransformAction::Drop,
            "tcp_routing" => TransformAction::TcpRouting(split_list(format)),
            "syslog_routing" => TransformAction::SyslogRouting(split_list(format)),
            "metadata:index" => TransformAction::SetIndex(format.to_string()),
            "metadata:sourcetype" => TransformAction::SetSourcetype(
                format.strip_prefix("sourcetype::").unwrap_or(format).to_string(),
            ),
            "metadata:host" => {
                TransformAction::SetHost(format.strip_prefix("host::").unwrap_or(format).to_string())
            }
            _ => TransformAction::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformStanza {
    pub name: String,
    pub action: TransformAction,
    pub attributes: BTreeMap<String, AttributeValue>,
}

// ============================================================================
// indexes.conf / server.conf
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStanza {
    pub name: String,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl IndexStanza {
    /// Whether the stanza declares an index rather than shared settings.
    pub fn is_index(&self) -> bool {
        self.name != DEFAULT_STANZA
            && !["volume:", "provider:", "provider-family:"]
                .iter()
                .any(|p| self.name.starts_with(p))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStanza {
    pub name: String,
    pub attributes: BTreeMap<String, AttributeValue>,
}

stanza_attributes!(
    InputStanza,
    OutputStanza,
    PropsStanza,
    TransformStanza,
    IndexStanza,
    ServerStanza
);

// ============================================================================
// Stanza
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stanza {
    Input(InputStanza),
    Output(OutputStanza),
    Props(PropsStanza),
    Transform(TransformStanza),
    Index(IndexStanza),
    Server(ServerStanza),
}

impl Stanza {
    pub fn from_merged(merged: MergedStanza) -> Self {
        let MergedStanza {
            kind,
            name,
            attributes,
            ..
        } = merged;
        match kind {
            ConfKind::Inputs => Stanza::Input(InputStanza {
                kind: InputKind::parse(&name),
                name,
                attributes,
            }),
            ConfKind::Outputs => Stanza::Output(OutputStanza {
                target: OutputTarget::parse(&name),
                name,
                attributes,
            }),
            ConfKind::Props => Stanza::Props(PropsStanza {
                pattern: PropsPattern::parse(&name),
                name,
                attributes,
            }),
            ConfKind::Transforms => {
                let action = TransformAction::from_dest(
                    attributes.get("DEST_KEY").map(|a| a.value.as_str()),
                    attributes.get("FORMAT").map(|a| a.value.as_str()),
                );
                Stanza::Transform(TransformStanza {
                    name,
                    action,
                    attributes,
                })
            }
            ConfKind::Indexes => Stanza::Index(IndexStanza { name, attributes }),
            ConfKind::Server => Stanza::Server(ServerStanza { name, attributes }),
        }
    }

    pub fn kind(&self) -> ConfKind {
        match self {
            Stanza::Input(_) => ConfKind::Inputs,
            Stanza::Output(_) => ConfKind::Outputs,
            Stanza::Props(_) => ConfKind::Props,
            Stanza::Transform(_) => ConfKind::Transforms,
            Stanza::Index(_) => ConfKind::Indexes,
            Stanza::Server(_) => ConfKind::Server,
        }
    }

    pub fn as_attributes(&self) -> &dyn StanzaAttributes {
        match self {
            Stanza::Input(s) => s,
            Stanza::Output(s) => s,
            Stanza::Props(s) => s,
            Stanza::Transform(s) => s,
            Stanza::Index(s) => s,
            Stanza::Server(s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;

    fn value(v: &str, line: usize) -> AttributeValue {
        AttributeValue {
            value: v.to_string(),
            layer: Layer::SystemLocal,
            app: None,
            provenance: Provenance::new("system/local/props.conf", line),
        }
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a:1, b:2 ,,\nc:3"), vec!["a:1", "b:2", "c:3"]);
    }

    #[test]
    fn test_input_kinds() {
        assert_eq!(
            InputKind::parse("monitor:///var/log/messages"),
            InputKind::Monitor {
                path: "/var/log/messages".to_string()
            }
        );
        assert_eq!(
            InputKind::parse("splunktcp://9997"),
            InputKind::SplunkTcp {
                port: Some(9997),
                ssl: false
            }
        );
        assert_eq!(
            InputKind::parse("splunktcp-ssl:9998"),
            InputKind::SplunkTcp {
                port: Some(9998),
                ssl: true
            }
        );
        assert_eq!(
            InputKind::parse("udp://10.0.0.1:514"),
            InputKind::Udp { port: Some(514) }
        );
        assert_eq!(
            InputKind::parse("http://my_hec"),
            InputKind::Http {
                token: Some("my_hec".to_string())
            }
        );
        assert_eq!(InputKind::parse("http"), InputKind::Http { token: None });
        assert_eq!(
            InputKind::parse("WinEventLog://Security"),
            InputKind::WinEventLog {
                channel: "Security".to_string()
            }
        );
        assert!(matches!(
            InputKind::parse("perfmon://CPU"),
            InputKind::Modular { .. }
        ));
        assert_eq!(InputKind::parse("SSL"), InputKind::Settings);
        assert_eq!(InputKind::parse("default"), InputKind::Default);
    }

    #[test]
    fn test_input_collectors() {
        assert!(InputKind::parse("monitor:///x").is_collector());
        assert!(!InputKind::parse("splunktcp://9997").is_collector());
        assert!(InputKind::parse("splunktcp://9997").is_receiver());
        assert!(!InputKind::parse("http").is_collector());
    }

    #[test]
    fn test_output_targets() {
        assert_eq!(OutputTarget::parse("tcpout"), OutputTarget::Global);
        assert_eq!(
            OutputTarget::parse("tcpout:primary"),
            OutputTarget::Group("primary".to_string())
        );
        assert_eq!(
            OutputTarget::parse("tcpout-server://idx1:9997"),
            OutputTarget::Server("idx1:9997".to_string())
        );
        assert_eq!(
            OutputTarget::parse("indexer_discovery:cm1"),
            OutputTarget::IndexerDiscovery("cm1".to_string())
        );
        assert_eq!(
            OutputTarget::parse("syslog:siem"),
            OutputTarget::SyslogGroup("siem".to_string())
        );
        assert_eq!(OutputTarget::parse("something"), OutputTarget::Other);
    }

    #[test]
    fn test_props_patterns() {
        assert_eq!(
            PropsPattern::parse("syslog"),
            PropsPattern::Sourcetype("syslog".to_string())
        );
        assert_eq!(
            PropsPattern::parse("source::/var/log/..."),
            PropsPattern::Source("/var/log/...".to_string())
        );
        assert!(
            PropsPattern::parse("source::/var/log/messages").specificity()
                < PropsPattern::parse("source::/var/log/*").specificity()
        );
        assert!(
            PropsPattern::parse("host::web*").specificity()
                < PropsPattern::parse("syslog").specificity()
        );
    }

    #[test]
    fn test_transform_chain_order() {
        let mut attributes = BTreeMap::new();
        attributes.insert("TRANSFORMS-b".to_string(), value("route_errors, tag", 2));
        attributes.insert("TRANSFORMS-a".to_string(), value("drop_debug", 5));
        attributes.insert("SHOULD_LINEMERGE".to_string(), value("false", 1));
        let props = PropsStanza {
            name: "syslog".to_string(),
            pattern: PropsPattern::parse("syslog"),
            attributes,
        };

        assert_eq!(props.transform_chain(), vec!["route_errors", "tag", "drop_debug"]);
        assert_eq!(props.declared_at().unwrap().line, 2);
    }

    #[test]
    fn test_transform_actions() {
        assert_eq!(
            TransformAction::from_dest(Some("queue"), Some("nullQueue")),
            TransformAction::Drop
        );
        assert_eq!(
            TransformAction::from_dest(Some("_MetaData:Index"), Some("errors")),
            TransformAction::SetIndex("errors".to_string())
        );
        assert_eq!(
            TransformAction::from_dest(Some("MetaData:Sourcetype"), Some("sourcetype::syslog:err")),
            TransformAction::SetSourcetype("syslog:err".to_string())
        );
        assert_eq!(
            TransformAction::from_dest(Some("_TCP_ROUTING"), Some("siem, archive")),
            TransformAction::TcpRouting(vec!["siem".to_string(), "archive".to_string()])
        );
        assert_eq!(TransformAction::from_dest(None, Some("x")), TransformAction::Other);
    }

    #[test]
    fn test_index_stanza_filter() {
        let idx = |name: &str| IndexStanza {
            name: name.to_string(),
            attributes: BTreeMap::new(),
        };
        assert!(idx("os").is_index());
        assert!(!idx("default").is_index());
        assert!(!idx("volume:hot").is_index());
    }

    #[test]
    fn test_input_inherits_default() {
        let mut defaults = BTreeMap::new();
        defaults.insert("index".to_string(), value("os", 1));
        defaults.insert("disabled".to_string(), value("1", 2));
        let mut input = InputStanza {
            name: "monitor:///x".to_string(),
            kind: InputKind::parse("monitor:///x"),
            attributes: BTreeMap::new(),
        };
        input.inherit(&defaults);

        assert_eq!(input.get("index"), Some("os"));
        assert_eq!(input.get("disabled"), None);
    }
}
