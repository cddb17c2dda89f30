//! Index-time props/transforms evaluation.
//!
//! Event `REGEX` values are not evaluated: a transform attached to a
//! matching props stanza is assumed to apply. Each routing attribute is
//! claimed by the first transform that sets it; later claimants are
//! shadowed.

use flowmap_conf::{HostConfig, PropsPattern, PropsStanza, StanzaAttributes, TransformAction};
use globset::{GlobBuilder, GlobMatcher};
use std::collections::BTreeSet;
use tracing::warn;

/// Attributes a transform can claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Claim {
    Index,
    Queue,
    Sourcetype,
    Host,
    TcpRouting,
    SyslogRouting,
}

/// Outcome of running one event shape through a host's transforms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub index: Option<String>,
    pub sourcetype: Option<String>,
    pub host: Option<String>,
    /// Name of the transform that sent the event to `nullQueue`.
    pub dropped_by: Option<String>,
    pub tcp_routing: Option<Vec<String>>,
    pub syslog_routing: Option<Vec<String>>,
    /// Applied transforms as labels, in order.
    pub filters: Vec<String>,
    /// Apps of the props and transforms that applied.
    pub apps: BTreeSet<String>,
    pub shadowed: Vec<String>,
    pub missing: Vec<String>,
}

impl Evaluation {
    pub fn drop_label(&self) -> Option<String> {
        self.dropped_by.as_ref().map(|name| format!("DROP:{}", name))
    }
}

struct PropsMatcher<'a> {
    stanza: &'a PropsStanza,
    glob: Option<GlobMatcher>,
    chain: Vec<String>,
}

impl<'a> PropsMatcher<'a> {
    fn matches(&self, source: &str, sourcetype: Option<&str>, event_host: &str) -> bool {
        match &self.stanza.pattern {
            PropsPattern::Default => true,
            PropsPattern::Sourcetype(st) => sourcetype == Some(st.as_str()),
            PropsPattern::Source(_) => self.glob.as_ref().is_some_and(|g| g.is_match(source)),
            PropsPattern::Host(_) => self.glob.as_ref().is_some_and(|g| g.is_match(event_host)),
            PropsPattern::Rule(_) => false,
        }
    }
}

/// Splunk source/host wildcards to a glob: `...` crosses directories, `*` does not.
fn compile_pattern(pattern: &str, case_insensitive: bool) -> Option<GlobMatcher> {
    let translated = pattern.replace("...", "**");
    match GlobBuilder::new(&translated)
        .literal_separator(true)
        .case_insensitive(case_insensitive)
        .build()
    {
        Ok(glob) => Some(glob.compile_matcher()),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "unusable props pattern");
            None
        }
    }
}

/// Props/transforms evaluator for one host.
pub struct TransformEngine<'a> {
    host: &'a HostConfig,
    matchers: Vec<PropsMatcher<'a>>,
}

impl<'a> TransformEngine<'a> {
    pub fn new(host: &'a HostConfig) -> Self {
        let mut matchers: Vec<PropsMatcher<'a>> = host
            .props
            .iter()
            .filter_map(|stanza| {
                let chain = stanza.transform_chain();
                if chain.is_empty() {
                    return None;
                }
                let glob = match &stanza.pattern {
                    PropsPattern::Source(p) => compile_pattern(p, false),
                    PropsPattern::Host(p) => compile_pattern(p, true),
                    _ => None,
                };
                Some(PropsMatcher {
                    stanza,
                    glob,
                    chain,
                })
            })
            .collect();
        matchers.sort_by(|a, b| {
            a.stanza
                .pattern
                .specificity()
                .cmp(&b.stanza.pattern.specificity())
                .then_with(|| a.stanza.declared_at().cmp(&b.stanza.declared_at()))
                .then_with(|| a.stanza.name.cmp(&b.stanza.name))
        });
        Self { host, matchers }
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Evaluate an event from `source` with `sourcetype` and `event_host`.
    pub fn evaluate(&self, source: &str, sourcetype: Option<&str>, event_host: &str) -> Evaluation {
        let mut eval = Evaluation::default();
        let mut claimed: BTreeSet<Claim> = BTreeSet::new();

        for matcher in self
            .matchers
            .iter()
            .filter(|m| m.matches(source, sourcetype, event_host))
        {
            let mut applied_any = false;
            for name in &matcher.chain {
                let Some(transform) = self.host.transforms.get(name) else {
                    eval.missing.push(name.clone());
                    continue;
                };

                let (claim, label) = match &transform.action {
                    TransformAction::Drop => (Some(Claim::Queue), None),
                    TransformAction::Keep(_) => (Some(Claim::Queue), Some("TRANSFORMS")),
                    TransformAction::SetIndex(_) => (Some(Claim::Index), Some("TRANSFORMS")),
                    TransformAction::SetSourcetype(_) => {
                        (Some(Claim::Sourcetype), Some("SOURCETYPE_REWRITE"))
                    }
                    TransformAction::SetHost(_) => (Some(Claim::Host), Some("TRANSFORMS")),
                    TransformAction::TcpRouting(_) => (Some(Claim::TcpRouting), Some("ROUTE")),
                    TransformAction::SyslogRouting(_) => {
                        (Some(Claim::SyslogRouting), Some("ROUTE"))
                    }
                    TransformAction::Other => (None, Some("TRANSFORMS")),
                };

                if let Some(claim) = claim {
                    if !claimed.insert(claim) {
                        eval.shadowed.push(name.clone());
                        continue;
                    }
                }

                match &transform.action {
                    TransformAction::Drop => eval.dropped_by = Some(name.clone()),
                    TransformAction::SetIndex(index) => eval.index = Some(index.clone()),
                    TransformAction::SetSourcetype(st) => eval.sourcetype = Some(st.clone()),
                    TransformAction::SetHost(h) => eval.host = Some(h.clone()),
                    TransformAction::TcpRouting(groups) => eval.tcp_routing = Some(groups.clone()),
                    TransformAction::SyslogRouting(groups) => {
                        eval.syslog_routing = Some(groups.clone())
                    }
                    TransformAction::Keep(_) | TransformAction::Other => {}
                }
                if let Some(label) = label {
                    let filter = format!("{}:{}", label, name);
                    if !eval.filters.contains(&filter) {
                        eval.filters.push(filter);
                    }
                }
                eval.apps.extend(transform.attributes().values().filter_map(|a| a.app.clone()));
                applied_any = true;
            }
            if applied_any {
                eval.apps
                    .extend(matcher.stanza.attributes().values().filter_map(|a| a.app.clone()));
            }
        }

        eval
    }
}
