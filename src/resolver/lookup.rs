//! Host lookup by the names other hosts use for it.

use flowmap_conf::{HostConfig, InputKind};
use std::collections::{BTreeSet, HashMap};

/// Listener families a destination can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Receiver {
    SplunkTcp,
    Tcp,
    Udp,
    Http,
}

/// Alias map over the uploaded hosts plus their receivers.
///
/// Aliases: the id, the snapshot directory name and `serverName`,
/// lower-cased; then the short name before the first `.` when that slot
/// is still free and the name is not an IP address.
#[derive(Debug)]
pub struct HostIndex<'a> {
    hosts: &'a [HostConfig],
    by_alias: HashMap<String, usize>,
    by_id: HashMap<&'a str, usize>,
    receivers: Vec<BTreeSet<(Receiver, Option<u16>)>>,
}

fn short_name(name: &str) -> Option<&str> {
    let (first, _) = name.split_once('.')?;
    first
        .chars()
        .any(|c| c.is_ascii_alphabetic())
        .then_some(first)
}

impl<'a> HostIndex<'a> {
    pub fn build(hosts: &'a [HostConfig]) -> Self {
        let mut by_alias = HashMap::new();
        let mut by_id = HashMap::new();

        for (i, host) in hosts.iter().enumerate() {
            by_id.insert(host.id.as_str(), i);
            by_alias.entry(host.id.to_lowercase()).or_insert(i);
        }
        for (i, host) in hosts.iter().enumerate() {
            by_alias.entry(host.dir_name.to_lowercase()).or_insert(i);
            if let Some(name) = host.server_name() {
                by_alias.entry(name.to_lowercase()).or_insert(i);
            }
        }
        for (i, host) in hosts.iter().enumerate() {
            let id = host.id.to_lowercase();
            if let Some(short) = short_name(&id) {
                by_alias.entry(short.to_string()).or_insert(i);
            }
        }

        let receivers = hosts.iter().map(receivers_of).collect();

        Self {
            hosts,
            by_alias,
            by_id,
            receivers,
        }
    }

    pub fn hosts(&self) -> &'a [HostConfig] {
        self.hosts
    }

    pub fn get(&self, id: &str) -> Option<&'a HostConfig> {
        self.by_id.get(id).map(|&i| &self.hosts[i])
    }

    /// Resolve a name from a `server =` list or URI to an uploaded host.
    pub fn resolve(&self, name: &str) -> Option<&'a HostConfig> {
        let lower = name.trim().to_lowercase();
        self.by_alias
            .get(&lower)
            .or_else(|| short_name(&lower).and_then(|s| self.by_alias.get(s)))
            .map(|&i| &self.hosts[i])
    }

    /// Whether `id` listens for `receiver` on `port`. A listener without a
    /// port, or a target without one, matches on family alone.
    pub fn has_receiver(&self, id: &str, receiver: Receiver, port: Option<u16>) -> bool {
        let Some(&i) = self.by_id.get(id) else {
            return false;
        };
        self.receivers[i].iter().any(|(r, p)| {
            *r == receiver && (port.is_none() || p.is_none() || *p == port)
        })
    }
}

fn receivers_of(host: &HostConfig) -> BTreeSet<(Receiver, Option<u16>)> {
    host.inputs
        .iter()
        .filter_map(|input| match &input.kind {
            InputKind::SplunkTcp { port, .. } => Some((Receiver::SplunkTcp, *port)),
            InputKind::Tcp { port, .. } => Some((Receiver::Tcp, *port)),
            InputKind::Udp { port } => Some((Receiver::Udp, *port)),
            InputKind::Http { token: Some(_) } => Some((Receiver::Http, None)),
            _ => None,
        })
        .collect()
}
