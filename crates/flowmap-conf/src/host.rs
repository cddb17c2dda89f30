//! Indexed view of one host's merged configuration.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::loader::HostSnapshot;
use crate::merge::{AttributeValue, MergedConfig, PrecedenceMerger};
use crate::stanza::{
    split_list, InputKind, InputStanza, OutputStanza, OutputTarget, PropsStanza, ServerStanza,
    Stanza, StanzaAttributes, TransformStanza,
};

/// Attributes whose presence turns TLS on for a tcpout group or server.
const TLS_CERT_KEYS: &[&str] = &["sslCertPath", "clientCert", "sslRootCAPath"];

/// One `host:port` entry from a `server =` list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerEntry {
    /// As written, lower-cased.
    pub address: String,
    pub host: String,
    pub port: Option<u16>,
}

impl ServerEntry {
    pub fn parse(address: &str) -> Option<Self> {
        let address = address.trim().to_lowercase();
        if address.is_empty() {
            return None;
        }
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host.to_string(), Some(port)),
                Err(_) => (address.clone(), None),
            },
            None => (address.clone(), None),
        };
        if host.is_empty() {
            return None;
        }
        Some(Self {
            address,
            host,
            port,
        })
    }
}

/// A tcpout or syslog group with inherited global settings applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputGroup {
    pub name: String,
    pub servers: Vec<ServerEntry>,
    /// `indexerDiscovery = <name>`
    pub indexer_discovery: Option<String>,
    pub syslog: bool,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl StanzaAttributes for OutputGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }
}

/// Explicit TLS decision from `useSSL` or certificate attributes.
fn tls_setting(attrs: &dyn StanzaAttributes) -> Option<bool> {
    if let Some(explicit) = attrs.get_bool("useSSL") {
        return Some(explicit);
    }
    TLS_CERT_KEYS
        .iter()
        .any(|k| attrs.get(k).is_some_and(|v| !v.is_empty()))
        .then_some(true)
}

impl OutputGroup {
    fn from_stanza(stanza: OutputStanza, global: Option<&OutputStanza>, syslog: bool) -> Self {
        let name = match &stanza.target {
            OutputTarget::Group(n) | OutputTarget::SyslogGroup(n) => n.clone(),
            _ => stanza.name.clone(),
        };
        let mut attributes = stanza.attributes;
        if let Some(global) = global {
            for (key, value) in &global.attributes {
                if key != "defaultGroup" && key != "disabled" {
                    attributes.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        let servers = attributes
            .get("server")
            .map(|v| split_list(&v.value))
            .unwrap_or_default()
            .iter()
            .filter_map(|s| ServerEntry::parse(s))
            .collect();
        let indexer_discovery = attributes
            .get("indexerDiscovery")
            .map(|v| v.value.trim().to_string())
            .filter(|v| !v.is_empty());

        Self {
            name,
            servers,
            indexer_discovery,
            syslog,
            attributes,
        }
    }

    /// `Some(true)` wrapped, `Some(false)` plain, `None` unknown.
    ///
    /// Explicit server lists default to plain; discovery groups to unknown.
    pub fn tls(&self) -> Option<bool> {
        match tls_setting(self) {
            Some(explicit) => Some(explicit),
            None if self.indexer_discovery.is_some() && self.servers.is_empty() => None,
            None => Some(false),
        }
    }

    /// Splunk-to-Splunk cooked transport. `sendCookedData = false` is raw TCP.
    pub fn cooked(&self) -> bool {
        !self.syslog && self.get_bool("sendCookedData").unwrap_or(true)
    }

    /// `type = udp|tcp` on syslog groups; udp when absent.
    pub fn syslog_transport(&self) -> &str {
        match self.get("type") {
            Some(t) if t.eq_ignore_ascii_case("tcp") => "tcp",
            _ => "udp",
        }
    }

    pub fn is_resolvable(&self) -> bool {
        !self.servers.is_empty() || self.indexer_discovery.is_some()
    }
}

/// Typed, indexed configuration of one host.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    /// Sanitized `serverName`, else the snapshot directory name.
    pub id: String,
    pub dir_name: String,
    pub apps: BTreeSet<String>,
    /// Enabled data inputs with `[default]` inherited; settings stanzas excluded.
    pub inputs: Vec<InputStanza>,
    pub tcpout: Option<OutputStanza>,
    pub groups: BTreeMap<String, OutputGroup>,
    pub syslog_groups: BTreeMap<String, OutputGroup>,
    pub default_groups: Vec<String>,
    pub syslog_default_groups: Vec<String>,
    /// `[tcpout-server://host:port]` keyed by lower-cased address.
    pub server_overrides: BTreeMap<String, OutputStanza>,
    pub discovery: BTreeMap<String, OutputStanza>,
    pub httpout: Option<OutputStanza>,
    pub props: Vec<PropsStanza>,
    pub transforms: BTreeMap<String, TransformStanza>,
    pub declared_indexes: BTreeSet<String>,
    pub server: BTreeMap<String, ServerStanza>,
    /// `kind:[stanza]` to sorted `file:line` of winning attributes.
    pub stanza_provenance: BTreeMap<String, Vec<String>>,
    /// `kind:[stanza]` of stanzas dropped as disabled.
    pub disabled: Vec<String>,
    pub output_stanza_count: usize,
}

impl HostConfig {
    pub fn from_snapshot(snapshot: &HostSnapshot, merger: &PrecedenceMerger) -> Self {
        let merged = merger.merge_snapshot(snapshot);
        Self::from_merged(&snapshot.dir_name, snapshot.apps.clone(), merged)
    }

    pub fn from_merged(dir_name: &str, apps: BTreeSet<String>, merged: MergedConfig) -> Self {
        let mut host = HostConfig {
            dir_name: dir_name.to_string(),
            apps,
            disabled: merged
                .disabled
                .iter()
                .map(|(kind, name)| format!("{}:[{}]", kind, name))
                .collect(),
            ..HostConfig::default()
        };

        let mut input_defaults = BTreeMap::new();
        let mut outputs = Vec::new();
        let mut syslog_global = None;

        for ((kind, name), stanza) in merged.stanzas {
            let mut provenance: Vec<String> = stanza
                .attributes
                .values()
                .map(|a| a.provenance.to_string())
                .chain(stanza.declared_at.iter().map(|p| p.to_string()))
                .collect();
            provenance.sort();
            provenance.dedup();
            host.stanza_provenance
                .insert(format!("{}:[{}]", kind, name), provenance);

            match Stanza::from_merged(stanza) {
                Stanza::Input(input) => match input.kind {
                    InputKind::Default => input_defaults = input.attributes,
                    InputKind::Settings | InputKind::Http { token: None } => {}
                    _ => host.inputs.push(input),
                },
                Stanza::Output(output) => {
                    if !matches!(output.target, OutputTarget::Default | OutputTarget::Other) {
                        host.output_stanza_count += 1;
                    }
                    match &output.target {
                        OutputTarget::Global => host.tcpout = Some(output),
                        OutputTarget::SyslogGlobal => syslog_global = Some(output),
                        OutputTarget::Server(address) => {
                            host.server_overrides
                                .insert(address.to_lowercase(), output);
                        }
                        OutputTarget::IndexerDiscovery(disc) => {
                            host.discovery.insert(disc.clone(), output);
                        }
                        OutputTarget::HttpOut => host.httpout = Some(output),
                        OutputTarget::Group(_) | OutputTarget::SyslogGroup(_) => {
                            outputs.push(output)
                        }
                        OutputTarget::Default | OutputTarget::Other => {}
                    }
                }
                Stanza::Props(props) => host.props.push(props),
                Stanza::Transform(transform) => {
                    host.transforms.insert(transform.name.clone(), transform);
                }
                Stanza::Index(index) => {
                    if index.is_index() {
                        host.declared_indexes.insert(index.name.clone());
                    }
                }
                Stanza::Server(server) => {
                    host.server.insert(server.name.clone(), server);
                }
            }
        }

        for input in &mut host.inputs {
            input.inherit(&input_defaults);
        }

        for output in outputs {
            match output.target {
                OutputTarget::SyslogGroup(_) => {
                    let group = OutputGroup::from_stanza(output, syslog_global.as_ref(), true);
                    host.syslog_groups.insert(group.name.clone(), group);
                }
                _ => {
                    let group = OutputGroup::from_stanza(output, host.tcpout.as_ref(), false);
                    host.groups.insert(group.name.clone(), group);
                }
            }
        }

        host.default_groups = host
            .tcpout
            .as_ref()
            .map(|t| t.get_list("defaultGroup"))
            .unwrap_or_default();
        host.syslog_default_groups = syslog_global
            .as_ref()
            .map(|s| s.get_list("defaultGroup"))
            .unwrap_or_default();

        host.id = host
            .server_name()
            .filter(|n| !n.contains('$'))
            .map(sanitize_host_id)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| sanitize_host_id(dir_name));

        debug!(
            host = %host.id,
            inputs = host.inputs.len(),
            groups = host.groups.len(),
            props = host.props.len(),
            transforms = host.transforms.len(),
            "built host config"
        );
        host
    }

    fn server_attr(&self, stanza: &str, key: &str) -> Option<&str> {
        self.server.get(stanza).and_then(|s| s.get(key))
    }

    /// `[general] serverName`
    pub fn server_name(&self) -> Option<&str> {
        self.server_attr("general", "serverName")
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// `[general] site`
    pub fn site(&self) -> Option<&str> {
        self.server_attr("general", "site")
    }

    /// `[clustering] mode`, lower-cased.
    pub fn clustering_mode(&self) -> Option<String> {
        self.server_attr("clustering", "mode")
            .map(|m| m.trim().to_lowercase())
    }

    pub fn cluster_label(&self) -> Option<&str> {
        self.server_attr("clustering", "cluster_label")
    }

    /// `[tcpout] indexAndForward = true`
    pub fn index_and_forward(&self) -> bool {
        self.tcpout
            .as_ref()
            .and_then(|t| t.get_bool("indexAndForward"))
            .unwrap_or(false)
    }

    /// Any onward output stanza at all.
    pub fn has_output_config(&self) -> bool {
        !self.groups.is_empty() || !self.syslog_groups.is_empty() || self.httpout.is_some()
    }

    /// Props or transforms that act at parse time.
    pub fn parses_data(&self) -> bool {
        self.props.iter().any(|p| !p.transform_chain().is_empty())
    }

    /// TLS for one server of a group, honouring `[tcpout-server://]` overrides.
    pub fn server_tls(&self, group: &OutputGroup, server: &ServerEntry) -> Option<bool> {
        self.server_overrides
            .get(&server.address)
            .and_then(|o| tls_setting(o))
            .or_else(|| group.tls())
    }

    /// `[httpout] uri` as a server entry plus its TLS state.
    pub fn httpout_target(&self) -> Option<(ServerEntry, bool)> {
        let uri = self.httpout.as_ref()?.get("uri")?.trim().to_lowercase();
        let (tls, rest) = if let Some(rest) = uri.strip_prefix("https://") {
            (true, rest)
        } else {
            (false, uri.strip_prefix("http://").unwrap_or(&uri))
        };
        let authority = rest.split('/').next().unwrap_or_default();
        ServerEntry::parse(authority).map(|entry| (entry, tls))
    }

    pub fn has_hec_inputs(&self) -> bool {
        self.inputs
            .iter()
            .any(|i| matches!(i.kind, InputKind::Http { token: Some(_) }))
    }
}

/// Keep `[A-Za-z0-9._-]`; everything else becomes `_`.
pub(crate) fn sanitize_host_id(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
