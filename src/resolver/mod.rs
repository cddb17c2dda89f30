//! Resolution of merged host configurations into a canonical graph.
//!
//! Every leaf input originates one flow. Flows travel along raw edges;
//! `splunktcp` receivers relay what arrives at their host, re-evaluated
//! through that host's transforms, until nothing changes. Raw edges are
//! then folded by key into the published edges.

mod lookup;
mod roles;
mod routing;
mod transforms;

pub use lookup::{HostIndex, Receiver};
pub use roles::{infer_labels, infer_roles};
pub use routing::{RouteOutcome, Router, Target};
pub use transforms::{Evaluation, TransformEngine};

use flowmap_conf::{HostConfig, InputKind, InputStanza, StanzaAttributes};
use flowmap_model::{
    CanonicalGraph, Edge, EdgeKey, Host, HostTrace, LoadTrace, PathKind, Protocol, ResolverStats,
    Traceability, DISCOVERY_PREFIX, GENERATOR,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info, warn};

/// Resolver knobs taken from the effective settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub generator: String,
    /// Index for events whose input and transforms name none.
    pub default_index: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            generator: GENERATOR.to_string(),
            default_index: "main".to_string(),
        }
    }
}

/// One event shape travelling through the topology.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Flow {
    /// Originating input stanza name.
    pub source: String,
    /// What `source::` props patterns match against.
    pub path: String,
    pub sourcetype: Option<String>,
    pub index: String,
    /// Event host, for `host::` props patterns.
    pub host: String,
}

/// Inbound protocol and path kind of an input.
pub fn classify_input(input: &InputStanza) -> (Protocol, PathKind) {
    let syslog_like = |port: Option<u16>| {
        port == Some(514)
            || input
                .get("sourcetype")
                .is_some_and(|st| st.to_lowercase().contains("syslog"))
    };
    match &input.kind {
        InputKind::Tcp { port, .. } if syslog_like(*port) => (Protocol::Syslog, PathKind::Syslog),
        InputKind::Tcp { .. } => (Protocol::Tcp, PathKind::Syslog),
        InputKind::Udp { port } if syslog_like(*port) => (Protocol::Syslog, PathKind::Syslog),
        InputKind::Udp { .. } => (Protocol::Udp, PathKind::Syslog),
        InputKind::Http { .. } => (Protocol::HttpEventCollector, PathKind::Hec),
        InputKind::Script { .. } => (Protocol::Splunktcp, PathKind::ScriptedInput),
        InputKind::WinEventLog { .. } | InputKind::Modular { .. } => {
            (Protocol::Splunktcp, PathKind::Modinput)
        }
        _ => (Protocol::Splunktcp, PathKind::Forwarding),
    }
}

/// Raw edges are distinct per input and destination port.
type RawKey = (EdgeKey, String, Option<u16>);

#[derive(Debug, Clone)]
struct RawEdge {
    edge: Edge,
    /// Flows forwarded along this edge after transforms.
    flows: BTreeSet<Flow>,
}

/// Per-host resolution state.
struct HostCtx<'a> {
    host: &'a HostConfig,
    engine: TransformEngine<'a>,
    router: Router<'a>,
    trace: HostTrace,
}

#[derive(Debug, Clone, Default)]
pub struct Resolver {
    settings: ResolverSettings,
}

impl Resolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    fn leaf_flow(&self, host: &HostConfig, input: &InputStanza) -> Flow {
        let path = input.get("source").map(str::to_string).unwrap_or_else(|| match &input.kind {
            InputKind::Monitor { path } | InputKind::Batch { path } | InputKind::Script { path } => {
                path.clone()
            }
            _ => input.name.clone(),
        });
        Flow {
            source: input.name.clone(),
            path,
            sourcetype: input
                .get("sourcetype")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            index: input
                .get("index")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| self.settings.default_index.clone()),
            host: input
                .get("host")
                .map(str::trim)
                .filter(|h| !h.is_empty() && !h.contains('$'))
                .map(str::to_string)
                .unwrap_or_else(|| host.id.clone()),
        }
    }

    /// Raw edges for one input carrying `flows`. With no flows the input
    /// still gets its configured routing.
    fn emit(
        &self,
        ctx: &mut HostCtx<'_>,
        input: &InputStanza,
        flows: &BTreeSet<Flow>,
    ) -> BTreeMap<RawKey, RawEdge> {
        let (_, path_kind) = classify_input(input);
        let input_apps: BTreeSet<String> = input
            .attributes()
            .values()
            .filter_map(|a| a.app.clone())
            .collect();

        let carried: Vec<Option<&Flow>> = if flows.is_empty() {
            vec![None]
        } else {
            flows.iter().map(Some).collect()
        };

        let mut raw: BTreeMap<RawKey, RawEdge> = BTreeMap::new();
        for flow in carried {
            let eval = match flow {
                Some(flow) if !ctx.engine.is_empty() => {
                    ctx.engine
                        .evaluate(&flow.path, flow.sourcetype.as_deref(), &flow.host)
                }
                _ => Evaluation::default(),
            };
            let mut outcome = ctx.router.route(input, &eval);
            if outcome.targets.is_empty() && eval.dropped_by.is_some() {
                outcome.targets.push(Target::unknown());
            }

            ctx.trace.shadowed_transforms.extend(eval.shadowed.iter().cloned());
            ctx.trace.missing_transforms.extend(eval.missing.iter().cloned());
            ctx.trace.dangling_group_refs.extend(outcome.dangling.iter().cloned());
            ctx.trace.unmatched_receivers.extend(outcome.unmatched.iter().cloned());

            let forwarded = match (flow, &eval.dropped_by) {
                (Some(flow), None) => Some(Flow {
                    index: eval.index.clone().unwrap_or_else(|| flow.index.clone()),
                    sourcetype: eval.sourcetype.clone().or_else(|| flow.sourcetype.clone()),
                    host: eval.host.clone().unwrap_or_else(|| flow.host.clone()),
                    ..flow.clone()
                }),
                _ => None,
            };

            for target in outcome.targets {
                let key = EdgeKey {
                    src_host: ctx.host.id.clone(),
                    dst_host: target.dst.clone(),
                    protocol: target.protocol,
                    path_kind,
                };
                let entry = raw
                    .entry((key.clone(), input.name.clone(), target.port))
                    .or_insert_with(|| {
                        let mut edge = Edge::new(key);
                        edge.weight = 1;
                        edge.tls = target.tls;
                        edge.confidence = target.confidence;
                        RawEdge {
                            edge,
                            flows: BTreeSet::new(),
                        }
                    });
                let edge = &mut entry.edge;
                edge.confidence = edge.confidence.max(target.confidence);
                edge.app_contexts.extend(input_apps.iter().cloned());
                edge.app_contexts.extend(eval.apps.iter().cloned());
                for filter in &eval.filters {
                    edge.push_filter(filter);
                }
                if let Some(label) = eval.drop_label() {
                    edge.drop_rules.insert(label);
                }
                if let Some(flow) = &forwarded {
                    edge.sources.insert(flow.source.clone());
                    if let Some(st) = &flow.sourcetype {
                        edge.sourcetypes.insert(st.clone());
                    }
                    edge.indexes.insert(flow.index.clone());
                    entry.flows.insert(flow.clone());
                }
            }
        }
        raw
    }

    /// Resolve every host into one graph. `load` is carried into the
    /// traceability block unchanged.
    pub fn resolve(&self, hosts: &[HostConfig], load: LoadTrace) -> CanonicalGraph {
        let index = HostIndex::build(hosts);
        let mut stats = ResolverStats::default();

        let mut ctxs: BTreeMap<&str, HostCtx<'_>> = BTreeMap::new();
        for host in hosts {
            ctxs.entry(host.id.as_str()).or_insert_with(|| HostCtx {
                host,
                engine: TransformEngine::new(host),
                router: Router::new(host, &index),
                trace: HostTrace::default(),
            });
        }

        let mut raw: BTreeMap<RawKey, RawEdge> = BTreeMap::new();
        let mut inbound: BTreeMap<String, BTreeSet<RawKey>> = BTreeMap::new();
        let mut relays: BTreeSet<String> = BTreeSet::new();
        let mut emitted: BTreeMap<(String, String), BTreeSet<RawKey>> = BTreeMap::new();

        for ctx in ctxs.values_mut() {
            let host = ctx.host;
            for input in &host.inputs {
                let (protocol, _) = classify_input(input);
                *stats.input_counts.entry(protocol.to_string()).or_default() += 1;

                if input.kind.is_receiver() {
                    relays.insert(ctx.host.id.clone());
                    continue;
                }
                let flows = BTreeSet::from([self.leaf_flow(host, input)]);
                for (key, edge) in self.emit(ctx, input, &flows) {
                    inbound.entry(key.0.dst_host.clone()).or_default().insert(key.clone());
                    raw.insert(key, edge);
                }
            }
        }

        let mut queue: VecDeque<String> = relays.iter().cloned().collect();
        let mut queued: BTreeSet<String> = relays.clone();
        while let Some(host_id) = queue.pop_front() {
            queued.remove(&host_id);
            stats.propagation_rounds += 1;
            let Some(ctx) = ctxs.get_mut(host_id.as_str()) else {
                continue;
            };
            let host = ctx.host;

            for input in host.inputs.iter().filter(|i| i.kind.is_receiver()) {
                let port = input.kind.port();
                let arriving: BTreeSet<Flow> = inbound
                    .get(&host.id)
                    .into_iter()
                    .flatten()
                    .filter(|(key, _, p)| {
                        key.protocol == Protocol::Splunktcp
                            && (port.is_none() || p.is_none() || *p == port)
                    })
                    .filter_map(|k| raw.get(k))
                    .flat_map(|r| r.flows.iter().cloned())
                    .collect();

                let fresh = self.emit(ctx, input, &arriving);
                let mut touched: BTreeSet<String> = BTreeSet::new();

                let previous = emitted
                    .remove(&(host.id.clone(), input.name.clone()))
                    .unwrap_or_default();
                for stale in previous.iter().filter(|k| !fresh.contains_key(*k)) {
                    raw.remove(stale);
                    if let Some(keys) = inbound.get_mut(&stale.0.dst_host) {
                        keys.remove(stale);
                    }
                    touched.insert(stale.0.dst_host.clone());
                }

                let mut current = BTreeSet::new();
                for (key, edge) in fresh {
                    if raw.get(&key).map_or(true, |prev| prev.flows != edge.flows) {
                        touched.insert(key.0.dst_host.clone());
                    }
                    inbound
                        .entry(key.0.dst_host.clone())
                        .or_default()
                        .insert(key.clone());
                    current.insert(key.clone());
                    raw.insert(key, edge);
                }
                emitted.insert((host.id.clone(), input.name.clone()), current);

                for dst in touched {
                    if relays.contains(&dst) && queued.insert(dst.clone()) {
                        queue.push_back(dst);
                    }
                }
            }
        }

        stats.raw_edge_count = raw.len();
        let mut merged: BTreeMap<EdgeKey, Edge> = BTreeMap::new();
        for ((key, _, _), contribution) in raw {
            match merged.get_mut(&key) {
                Some(edge) => edge.absorb(contribution.edge),
                None => {
                    merged.insert(key, contribution.edge);
                }
            }
        }
        stats.merged_edge_count = merged.len();

        let mut graph_hosts: Vec<Host> = Vec::new();
        let mut source_hosts: Vec<String> = Vec::new();
        let mut host_traces: BTreeMap<String, HostTrace> = BTreeMap::new();
        for (id, ctx) in ctxs {
            let host = ctx.host;
            let mut trace = ctx.trace;
            fill_trace(host, &ctx.router, &mut trace);
            for name in &trace.dangling_group_refs {
                warn!(host = %id, group = %name, "output group referenced but not defined");
            }
            for name in &trace.missing_transforms {
                warn!(host = %id, transform = %name, "transform referenced by props but not defined");
            }

            if trace.input_count > 0 || trace.output_count > 0 {
                source_hosts.push(id.to_string());
            }
            graph_hosts.push(Host::new(
                id,
                infer_roles(host),
                infer_labels(host),
                host.apps.iter().cloned(),
            ));
            debug!(host = %id, inputs = trace.input_count, "resolved host");
            host_traces.insert(id.to_string(), trace);
        }

        let placeholders: BTreeSet<&str> = merged
            .values()
            .map(|e| e.dst_host.as_str())
            .filter(|dst| index.get(dst).is_none())
            .collect();
        stats.placeholder_count = placeholders.len();
        for id in placeholders {
            graph_hosts.push(Host::placeholder(id, id.starts_with(DISCOVERY_PREFIX)));
        }

        let edges: Vec<Edge> = merged.into_values().collect();
        info!(
            hosts = graph_hosts.len(),
            edges = edges.len(),
            raw_edges = stats.raw_edge_count,
            placeholders = stats.placeholder_count,
            rounds = stats.propagation_rounds,
            "resolved graph"
        );

        CanonicalGraph::new(
            graph_hosts,
            edges,
            source_hosts,
            self.settings.generator.clone(),
            Traceability {
                hosts: host_traces,
                resolver: stats,
                load,
            },
        )
    }
}

fn fill_trace(host: &HostConfig, router: &Router<'_>, trace: &mut HostTrace) {
    trace.declared_indexes = host.declared_indexes.clone();
    trace.output_groups = host.groups.keys().cloned().collect();
    trace.default_groups = host.default_groups.clone();
    trace.discovery_groups = host
        .groups
        .values()
        .filter_map(|g| g.indexer_discovery.clone().map(|d| (g.name.clone(), d)))
        .collect();
    trace.input_count = host.inputs.len();
    trace.output_count = host.output_stanza_count;
    trace.has_output_config = host.has_output_config();
    trace.resolvable_targets = router.all_destinations().len();
    trace.apps = host.apps.clone();
    trace.stanzas = host.stanza_provenance.clone();
    trace.disabled_stanzas = host.disabled.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmap_conf::{ConfKind, Layer, PrecedenceMerger, Provenance, RawRecord};
    use flowmap_model::{Confidence, Role, UNKNOWN_DESTINATION};

    fn host(dir: &str, records: &[(ConfKind, &str, &str, &str)]) -> HostConfig {
        let raw: Vec<RawRecord> = records
            .iter()
            .enumerate()
            .map(|(line, (kind, stanza, key, value))| RawRecord {
                kind: *kind,
                stanza: stanza.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                layer: Layer::SystemLocal,
                app: None,
                provenance: Provenance::new(format!("system/local/{}", kind.file_name()), line + 1),
            })
            .collect();
        let merged = PrecedenceMerger::default().merge(&[], &raw);
        HostConfig::from_merged(dir, BTreeSet::new(), merged)
    }

    const I: ConfKind = ConfKind::Inputs;
    const O: ConfKind = ConfKind::Outputs;
    const P: ConfKind = ConfKind::Props;
    const T: ConfKind = ConfKind::Transforms;

    fn chain() -> Vec<HostConfig> {
        vec![
            host(
                "uf01",
                &[
                    (I, "monitor:///var/log/messages", "index", "os"),
                    (I, "monitor:///var/log/messages", "sourcetype", "syslog"),
                    (O, "tcpout", "defaultGroup", "hf"),
                    (O, "tcpout:hf", "server", "hf01:9997"),
                ],
            ),
            host(
                "hf01",
                &[
                    (I, "splunktcp://9997", "connection_host", "ip"),
                    (O, "tcpout", "defaultGroup", "idx"),
                    (O, "tcpout:idx", "server", "idx01:9997"),
                    (O, "tcpout:idx", "useSSL", "true"),
                ],
            ),
            host(
                "idx01",
                &[
                    (I, "splunktcp-ssl://9997", "connection_host", "ip"),
                    (ConfKind::Indexes, "os", "homePath", "$SPLUNK_DB/os/db"),
                ],
            ),
        ]
    }

    fn edge<'g>(graph: &'g CanonicalGraph, src: &str, dst: &str) -> &'g Edge {
        graph
            .edges
            .iter()
            .find(|e| e.src_host == src && e.dst_host == dst)
            .unwrap_or_else(|| panic!("no edge {} -> {}", src, dst))
    }

    #[test]
    fn test_forwarding_chain() {
        let graph = Resolver::default().resolve(&chain(), LoadTrace::default());

        assert_eq!(graph.edges.len(), 2);
        let uf = edge(&graph, "uf01", "hf01");
        assert_eq!(uf.tls, Some(false));
        assert_eq!(uf.protocol, Protocol::Splunktcp);
        assert_eq!(uf.path_kind, PathKind::Forwarding);
        assert_eq!(uf.indexes.iter().collect::<Vec<_>>(), vec!["os"]);

        let hf = edge(&graph, "hf01", "idx01");
        assert_eq!(hf.tls, Some(true));
        assert_eq!(hf.indexes.iter().collect::<Vec<_>>(), vec!["os"]);
        assert_eq!(hf.sources.iter().collect::<Vec<_>>(), vec!["monitor:///var/log/messages"]);
        assert_eq!(hf.confidence, Confidence::Explicit);

        let roles = graph.host_index();
        assert!(roles["uf01"].has_role(Role::UniversalForwarder));
        assert!(roles["idx01"].has_role(Role::Indexer));
        assert_eq!(graph.meta.source_hosts, vec!["hf01", "idx01", "uf01"]);
        assert!(graph.meta.traceability.resolver.propagation_rounds >= 1);
    }

    #[test]
    fn test_relay_drop_and_placeholder() {
        let mut hosts = chain();
        hosts[1] = host(
            "hf01",
            &[
                (I, "splunktcp://9997", "connection_host", "ip"),
                (O, "tcpout", "defaultGroup", "idx"),
                (O, "tcpout:idx", "server", "idx99:9997"),
                (P, "syslog", "TRANSFORMS-null", "drop_syslog"),
                (T, "drop_syslog", "DEST_KEY", "queue"),
                (T, "drop_syslog", "FORMAT", "nullQueue"),
            ],
        );
        let graph = Resolver::default().resolve(&hosts, LoadTrace::default());

        let dropped = edge(&graph, "hf01", "idx99");
        assert!(dropped.indexes.is_empty());
        assert!(dropped.sources.is_empty());
        assert_eq!(dropped.drop_rules.iter().collect::<Vec<_>>(), vec!["DROP:drop_syslog"]);

        let placeholder = graph.host_index()["idx99"].clone();
        assert!(placeholder.has_role(Role::Unknown));
        assert!(graph.is_placeholder("idx99"));
        assert_eq!(graph.meta.traceability.resolver.placeholder_count, 1);
    }

    #[test]
    fn test_drop_on_terminal_host_is_kept() {
        let mut hosts = chain();
        hosts[2] = host(
            "idx01",
            &[
                (I, "splunktcp-ssl://9997", "connection_host", "ip"),
                (ConfKind::Indexes, "os", "homePath", "$SPLUNK_DB/os/db"),
                (P, "syslog", "TRANSFORMS-null", "setnull"),
                (T, "setnull", "DEST_KEY", "queue"),
                (T, "setnull", "FORMAT", "nullQueue"),
            ],
        );
        let graph = Resolver::default().resolve(&hosts, LoadTrace::default());

        assert_eq!(graph.edges.len(), 3);
        let discarded = edge(&graph, "idx01", UNKNOWN_DESTINATION);
        assert!(discarded.is_discard_only());
        assert_eq!(discarded.confidence, Confidence::Derived);
        assert_eq!(discarded.drop_rules.iter().collect::<Vec<_>>(), vec!["DROP:setnull"]);
        assert!(graph.host_index()["idx01"].has_role(Role::Indexer));
    }

    #[test]
    fn test_cycle_terminates() {
        let hosts = vec![
            host(
                "a",
                &[
                    (I, "monitor:///var/log/a", "index", "os"),
                    (I, "splunktcp://9997", "connection_host", "ip"),
                    (O, "tcpout:next", "server", "b:9997"),
                ],
            ),
            host(
                "b",
                &[
                    (I, "splunktcp://9997", "connection_host", "ip"),
                    (O, "tcpout:next", "server", "c:9997"),
                ],
            ),
            host(
                "c",
                &[
                    (I, "splunktcp://9997", "connection_host", "ip"),
                    (O, "tcpout:next", "server", "a:9997"),
                ],
            ),
        ];
        let graph = Resolver::default().resolve(&hosts, LoadTrace::default());

        assert_eq!(graph.edges.len(), 3);
        assert!(graph.edges.iter().all(|e| e.sources.contains("monitor:///var/log/a")));
    }

    #[test]
    fn test_weight_counts_contributions() {
        let hosts = vec![host(
            "uf01",
            &[
                (I, "monitor:///var/log/a", "index", "os"),
                (I, "monitor:///var/log/b", "index", "web"),
                (O, "tcpout:only", "server", "idx09:9997"),
            ],
        )];
        let graph = Resolver::default().resolve(&hosts, LoadTrace::default());

        assert_eq!(graph.edges.len(), 1);
        let edge = &graph.edges[0];
        assert_eq!(edge.weight, 2);
        assert_eq!(edge.confidence, Confidence::Derived);
        assert_eq!(edge.indexes.iter().collect::<Vec<_>>(), vec!["os", "web"]);
        assert_eq!(graph.meta.traceability.resolver.raw_edge_count, 2);
    }

    #[test]
    fn test_classify_syslog_inputs() {
        let hosts = vec![host(
            "sys01",
            &[
                (I, "udp://514", "index", "net"),
                (I, "tcp://1514", "sourcetype", "cisco:syslog"),
                (I, "tcp://9000", "sourcetype", "app"),
            ],
        )];
        let kinds: Vec<(Protocol, PathKind)> = hosts[0].inputs.iter().map(classify_input).collect();
        assert!(kinds.contains(&(Protocol::Syslog, PathKind::Syslog)));
        assert!(kinds.contains(&(Protocol::Tcp, PathKind::Syslog)));
        assert_eq!(kinds.iter().filter(|k| k.0 == Protocol::Syslog).count(), 2);
    }

    #[test]
    fn test_default_index_applies() {
        let hosts = vec![host(
            "uf01",
            &[
                (I, "monitor:///var/log/a", "sourcetype", "app"),
                (O, "tcpout:only", "server", "idx09:9997"),
            ],
        )];
        let resolver = Resolver::new(ResolverSettings {
            default_index: "fallback".to_string(),
            ..ResolverSettings::default()
        });
        let graph = resolver.resolve(&hosts, LoadTrace::default());
        assert_eq!(graph.edges[0].indexes.iter().collect::<Vec<_>>(), vec!["fallback"]);
    }
}
