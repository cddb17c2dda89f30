//! Output routing: which destinations an input's events go to.

use flowmap_conf::{HostConfig, InputStanza, OutputGroup, ServerEntry, StanzaAttributes};
use flowmap_model::{merge_tls, Confidence, Protocol, DISCOVERY_PREFIX, UNKNOWN_DESTINATION};
use std::collections::BTreeSet;

use super::lookup::{HostIndex, Receiver};
use super::transforms::Evaluation;

/// One resolved destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Uploaded host id, or the placeholder id.
    pub dst: String,
    pub protocol: Protocol,
    pub port: Option<u16>,
    pub tls: Option<bool>,
    pub confidence: Confidence,
}

impl Target {
    /// Stand-in for events with no resolvable destination.
    pub fn unknown() -> Self {
        Self {
            dst: UNKNOWN_DESTINATION.to_string(),
            protocol: Protocol::Splunktcp,
            port: None,
            tls: None,
            confidence: Confidence::Derived,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    pub targets: Vec<Target>,
    /// Group names referenced but not defined.
    pub dangling: BTreeSet<String>,
    /// `dst:port` entries with no matching receiver on an uploaded host.
    pub unmatched: BTreeSet<String>,
    /// Fanned out to every tcpout group for lack of a default.
    pub ambiguous: bool,
}

impl RouteOutcome {
    fn push(&mut self, target: Target) {
        match self
            .targets
            .iter_mut()
            .find(|t| t.dst == target.dst && t.protocol == target.protocol && t.port == target.port)
        {
            Some(existing) => {
                existing.tls = merge_tls(existing.tls, target.tls);
                existing.confidence = existing.confidence.max(target.confidence);
            }
            None => self.targets.push(target),
        }
    }
}

pub struct Router<'a> {
    host: &'a HostConfig,
    index: &'a HostIndex<'a>,
}

impl<'a> Router<'a> {
    pub fn new(host: &'a HostConfig, index: &'a HostIndex<'a>) -> Self {
        Self { host, index }
    }

    /// Route one input, honouring routing claims from `eval` first.
    pub fn route(&self, input: &InputStanza, eval: &Evaluation) -> RouteOutcome {
        let mut outcome = RouteOutcome::default();

        let requested = match (&eval.tcp_routing, &eval.syslog_routing) {
            (None, None) => {
                let tcp = input.get_list("_TCP_ROUTING");
                let syslog = input.get_list("_SYSLOG_ROUTING");
                (!tcp.is_empty() || !syslog.is_empty()).then_some((tcp, syslog))
            }
            (tcp, syslog) => Some((
                tcp.clone().unwrap_or_default(),
                syslog.clone().unwrap_or_default(),
            )),
        };

        let routed = match requested {
            Some((tcp, syslog)) => {
                let mut groups = self.lookup(&tcp, false, &mut outcome);
                groups.extend(self.lookup(&syslog, true, &mut outcome));
                if groups.is_empty() {
                    self.fallback(Confidence::Derived, &mut outcome)
                } else {
                    for group in groups {
                        self.expand(group, Confidence::Explicit, &mut outcome);
                    }
                    true
                }
            }
            None => self.fallback(Confidence::Explicit, &mut outcome),
        };

        if !routed && !outcome.dangling.is_empty() {
            outcome.push(Target::unknown());
        }
        outcome
    }

    /// Every destination any output of this host can reach.
    pub fn all_destinations(&self) -> BTreeSet<String> {
        let mut outcome = RouteOutcome::default();
        for group in self.host.groups.values().chain(self.host.syslog_groups.values()) {
            self.expand(group, Confidence::Explicit, &mut outcome);
        }
        self.push_httpout(Confidence::Explicit, &mut outcome);
        outcome.targets.into_iter().map(|t| t.dst).collect()
    }

    fn lookup(&self, names: &[String], syslog: bool, outcome: &mut RouteOutcome) -> Vec<&'a OutputGroup> {
        let table = if syslog {
            &self.host.syslog_groups
        } else {
            &self.host.groups
        };
        let mut found = Vec::new();
        for name in names {
            if name == "*" {
                found.extend(table.values());
                continue;
            }
            match table.get(name) {
                Some(group) => found.push(group),
                None => {
                    outcome.dangling.insert(name.clone());
                }
            }
        }
        found
    }

    /// Steps after explicit routing: default groups, the only group, every
    /// group, then `httpout`.
    fn fallback(&self, confidence: Confidence, outcome: &mut RouteOutcome) -> bool {
        let mut defaults = self.lookup(&self.host.default_groups, false, outcome);
        defaults.extend(self.lookup(&self.host.syslog_default_groups, true, outcome));
        if !defaults.is_empty() {
            for group in defaults {
                self.expand(group, confidence, outcome);
            }
            return true;
        }

        match self.host.groups.len() {
            0 => {}
            1 => {
                for group in self.host.groups.values() {
                    self.expand(group, Confidence::Derived, outcome);
                }
                return true;
            }
            _ => {
                outcome.ambiguous = true;
                for group in self.host.groups.values() {
                    self.expand(group, Confidence::Derived, outcome);
                }
                return true;
            }
        }

        self.push_httpout(confidence, outcome)
    }

    fn push_httpout(&self, confidence: Confidence, outcome: &mut RouteOutcome) -> bool {
        let Some((entry, tls)) = self.host.httpout_target() else {
            return false;
        };
        self.push_server(
            &entry,
            Protocol::HttpEventCollector,
            Some(tls),
            Receiver::Http,
            confidence,
            outcome,
        );
        true
    }

    fn expand(&self, group: &OutputGroup, confidence: Confidence, outcome: &mut RouteOutcome) {
        if group.syslog {
            let receiver = match group.syslog_transport() {
                "tcp" => Receiver::Tcp,
                _ => Receiver::Udp,
            };
            for server in &group.servers {
                self.push_server(server, Protocol::Syslog, Some(false), receiver, confidence, outcome);
            }
            return;
        }

        let (protocol, receiver) = if group.cooked() {
            (Protocol::Splunktcp, Receiver::SplunkTcp)
        } else {
            (Protocol::Tcp, Receiver::Tcp)
        };

        if group.servers.is_empty() {
            if let Some(name) = &group.indexer_discovery {
                outcome.push(Target {
                    dst: format!("{}{}", DISCOVERY_PREFIX, name),
                    protocol,
                    port: None,
                    tls: group.tls(),
                    confidence: Confidence::Derived,
                });
            }
            return;
        }

        for server in &group.servers {
            let tls = self.host.server_tls(group, server);
            self.push_server(server, protocol, tls, receiver, confidence, outcome);
        }
    }

    fn push_server(
        &self,
        server: &ServerEntry,
        protocol: Protocol,
        tls: Option<bool>,
        receiver: Receiver,
        mut confidence: Confidence,
        outcome: &mut RouteOutcome,
    ) {
        let dst = match self.index.resolve(&server.host) {
            Some(dst) => {
                if server.port.is_some() && !self.index.has_receiver(&dst.id, receiver, server.port) {
                    confidence = Confidence::Derived;
                    outcome.unmatched.insert(match server.port {
                        Some(port) => format!("{}:{}", dst.id, port),
                        None => dst.id.clone(),
                    });
                }
                dst.id.clone()
            }
            None => server.host.clone(),
        };
        outcome.push(Target {
            dst,
            protocol,
            port: server.port,
            tls,
            confidence,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmap_conf::{ConfKind, Layer, PrecedenceMerger, Provenance, RawRecord};
    use std::collections::BTreeSet as Set;

    fn host(dir: &str, records: &[(ConfKind, &str, &str, &str)]) -> HostConfig {
        let raw: Vec<RawRecord> = records
            .iter()
            .map(|(kind, stanza, key, value)| RawRecord {
                kind: *kind,
                stanza: stanza.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                layer: Layer::SystemLocal,
                app: None,
                provenance: Provenance::new(format!("system/local/{}", kind.file_name()), 1),
            })
            .collect();
        let merged = PrecedenceMerger::default().merge(&[], &raw);
        HostConfig::from_merged(dir, Set::new(), merged)
    }

    const I: ConfKind = ConfKind::Inputs;
    const O: ConfKind = ConfKind::Outputs;

    fn indexer() -> HostConfig {
        host("idx01", &[(I, "splunktcp://9997", "disabled", "0")])
    }

    fn dsts(outcome: &RouteOutcome) -> Vec<&str> {
        outcome.targets.iter().map(|t| t.dst.as_str()).collect()
    }

    #[test]
    fn test_default_group_explicit() {
        let hosts = vec![
            host(
                "uf01",
                &[
                    (I, "monitor:///var/log/messages", "index", "os"),
                    (O, "tcpout", "defaultGroup", "primary"),
                    (O, "tcpout:primary", "server", "idx01.example.com:9997"),
                ],
            ),
            indexer(),
        ];
        let index = HostIndex::build(&hosts);
        let router = Router::new(&hosts[0], &index);
        let outcome = router.route(&hosts[0].inputs[0], &Evaluation::default());

        assert_eq!(dsts(&outcome), vec!["idx01"]);
        let target = &outcome.targets[0];
        assert_eq!(target.protocol, Protocol::Splunktcp);
        assert_eq!(target.tls, Some(false));
        assert_eq!(target.confidence, Confidence::Explicit);
        assert!(outcome.unmatched.is_empty());
    }

    #[test]
    fn test_single_group_is_derived() {
        let hosts = vec![host(
            "uf01",
            &[
                (I, "monitor:///var/log/messages", "index", "os"),
                (O, "tcpout:only", "server", "idx09:9997"),
            ],
        )];
        let index = HostIndex::build(&hosts);
        let outcome = Router::new(&hosts[0], &index).route(&hosts[0].inputs[0], &Evaluation::default());

        assert_eq!(dsts(&outcome), vec!["idx09"]);
        assert_eq!(outcome.targets[0].confidence, Confidence::Derived);
        assert!(!outcome.ambiguous);
    }

    #[test]
    fn test_ambiguous_fans_out() {
        let hosts = vec![host(
            "hf01",
            &[
                (I, "monitor:///var/log/messages", "index", "os"),
                (O, "tcpout:a", "server", "idx01:9997"),
                (O, "tcpout:b", "server", "idx02:9997"),
            ],
        )];
        let index = HostIndex::build(&hosts);
        let outcome = Router::new(&hosts[0], &index).route(&hosts[0].inputs[0], &Evaluation::default());

        assert!(outcome.ambiguous);
        assert_eq!(dsts(&outcome), vec!["idx01", "idx02"]);
    }

    #[test]
    fn test_input_routing_and_dangling_fallback() {
        let hosts = vec![host(
            "uf01",
            &[
                (I, "monitor:///a", "_TCP_ROUTING", "ghost"),
                (I, "monitor:///b", "_TCP_ROUTING", "*"),
                (O, "tcpout:real", "server", "idx01:9997"),
            ],
        )];
        let index = HostIndex::build(&hosts);
        let router = Router::new(&hosts[0], &index);

        let a = router.route(&hosts[0].inputs[0], &Evaluation::default());
        assert_eq!(a.dangling.iter().collect::<Vec<_>>(), vec!["ghost"]);
        assert_eq!(dsts(&a), vec!["idx01"]);
        assert_eq!(a.targets[0].confidence, Confidence::Derived);

        let b = router.route(&hosts[0].inputs[1], &Evaluation::default());
        assert!(b.dangling.is_empty());
        assert_eq!(b.targets[0].confidence, Confidence::Explicit);
    }

    #[test]
    fn test_unknown_destination_when_nothing_resolves() {
        let hosts = vec![host(
            "uf01",
            &[
                (I, "monitor:///a", "index", "os"),
                (O, "tcpout", "defaultGroup", "ghost"),
            ],
        )];
        let index = HostIndex::build(&hosts);
        let outcome = Router::new(&hosts[0], &index).route(&hosts[0].inputs[0], &Evaluation::default());

        assert_eq!(dsts(&outcome), vec![UNKNOWN_DESTINATION]);
        assert_eq!(outcome.targets[0].confidence, Confidence::Derived);
    }

    #[test]
    fn test_terminal_without_outputs() {
        let hosts = vec![indexer()];
        let index = HostIndex::build(&hosts);
        let outcome = Router::new(&hosts[0], &index).route(&hosts[0].inputs[0], &Evaluation::default());
        assert!(outcome.targets.is_empty());
        assert!(outcome.dangling.is_empty());
    }

    #[test]
    fn test_indexer_discovery_placeholder() {
        let hosts = vec![host(
            "uf01",
            &[
                (I, "monitor:///a", "index", "os"),
                (O, "tcpout", "defaultGroup", "cluster"),
                (O, "tcpout:cluster", "indexerDiscovery", "cm1"),
            ],
        )];
        let index = HostIndex::build(&hosts);
        let outcome = Router::new(&hosts[0], &index).route(&hosts[0].inputs[0], &Evaluation::default());

        let target = &outcome.targets[0];
        assert_eq!(target.dst, "indexer_discovery:cm1");
        assert_eq!(target.confidence, Confidence::Derived);
        assert_eq!(target.tls, None);
    }

    #[test]
    fn test_receiver_mismatch_downgrades() {
        let hosts = vec![
            host(
                "uf01",
                &[
                    (I, "monitor:///a", "index", "os"),
                    (O, "tcpout", "defaultGroup", "primary"),
                    (O, "tcpout:primary", "server", "idx01:9998"),
                ],
            ),
            indexer(),
        ];
        let index = HostIndex::build(&hosts);
        let outcome = Router::new(&hosts[0], &index).route(&hosts[0].inputs[0], &Evaluation::default());

        assert_eq!(outcome.targets[0].confidence, Confidence::Derived);
        assert_eq!(outcome.unmatched.iter().collect::<Vec<_>>(), vec!["idx01:9998"]);
    }

    #[test]
    fn test_transform_claim_wins_and_syslog_protocol() {
        let hosts = vec![host(
            "hf01",
            &[
                (I, "udp://514", "sourcetype", "syslog"),
                (O, "tcpout", "defaultGroup", "primary"),
                (O, "tcpout:primary", "server", "idx01:9997"),
                (O, "syslog:siem", "server", "siem01:514"),
            ],
        )];
        let index = HostIndex::build(&hosts);
        let eval = Evaluation {
            syslog_routing: Some(vec!["siem".to_string()]),
            ..Evaluation::default()
        };
        let outcome = Router::new(&hosts[0], &index).route(&hosts[0].inputs[0], &eval);

        assert_eq!(dsts(&outcome), vec!["siem01"]);
        assert_eq!(outcome.targets[0].protocol, Protocol::Syslog);
        assert_eq!(outcome.targets[0].tls, Some(false));
    }

    #[test]
    fn test_httpout_and_raw_tcp() {
        let hosts = vec![
            host(
                "uf01",
                &[
                    (I, "monitor:///a", "index", "os"),
                    (O, "httpout", "uri", "https://hec.example.com:8088"),
                ],
            ),
            host(
                "uf02",
                &[
                    (I, "monitor:///a", "index", "os"),
                    (O, "tcpout:raw", "server", "collector:5140"),
                    (O, "tcpout:raw", "sendCookedData", "false"),
                ],
            ),
        ];
        let index = HostIndex::build(&hosts);

        let hec = Router::new(&hosts[0], &index).route(&hosts[0].inputs[0], &Evaluation::default());
        assert_eq!(hec.targets[0].dst, "hec.example.com");
        assert_eq!(hec.targets[0].protocol, Protocol::HttpEventCollector);
        assert_eq!(hec.targets[0].tls, Some(true));

        let raw = Router::new(&hosts[1], &index).route(&hosts[1].inputs[0], &Evaluation::default());
        assert_eq!(raw.targets[0].protocol, Protocol::Tcp);
    }

    #[test]
    fn test_all_destinations() {
        let hosts = vec![host(
            "hf01",
            &[
                (O, "tcpout:a", "server", "idx01:9997, idx02:9997"),
                (O, "tcpout:b", "server", "idx02:9997"),
                (O, "tcpout:empty", "compressed", "true"),
            ],
        )];
        let index = HostIndex::build(&hosts);
        let all = Router::new(&hosts[0], &index).all_destinations();
        assert_eq!(all.into_iter().collect::<Vec<_>>(), vec!["idx01", "idx02"]);
    }
}
