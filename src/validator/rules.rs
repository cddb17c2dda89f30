//! Built-in rules.

use flowmap_model::{Finding, FindingCode, Role};
use std::collections::{BTreeMap, BTreeSet};

use super::cycles::find_cycles;
use super::{Rule, RuleContext, RuleError};

/// Edge into a placeholder that is not an indexer-discovery stand-in.
pub struct DanglingOutput;

impl Rule for DanglingOutput {
    fn code(&self) -> FindingCode {
        FindingCode::DanglingOutput
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();
        for edge in &ctx.graph.edges {
            if edge.is_discard_only() || !ctx.graph.is_placeholder(&edge.dst_host) {
                continue;
            }
            let dst = ctx.host(&edge.dst_host)?;
            if ctx.graph.is_discovery_placeholder(dst) {
                continue;
            }
            findings.push(
                Finding::new(
                    self.code(),
                    format!(
                        "{} forwards to {}, which has no uploaded configuration",
                        edge.src_host, edge.dst_host
                    ),
                )
                .with("src_host", &edge.src_host)
                .with("dst_host", &edge.dst_host)
                .with("protocol", edge.protocol.as_str()),
            );
        }
        Ok(findings)
    }
}

/// Index reaching an indexer that neither declares it nor has it built in.
pub struct UnknownIndex;

impl Rule for UnknownIndex {
    fn code(&self) -> FindingCode {
        FindingCode::UnknownIndex
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();
        for edge in &ctx.graph.edges {
            if ctx.graph.is_placeholder(&edge.dst_host) || !ctx.host(&edge.dst_host)?.has_role(Role::Indexer) {
                continue;
            }
            let declared = &ctx.trace(&edge.dst_host)?.declared_indexes;
            for index in &edge.indexes {
                if declared.contains(index) || ctx.settings.builtin_indexes.contains(index) {
                    continue;
                }
                findings.push(
                    Finding::new(
                        self.code(),
                        format!("index {} is not defined on {}", index, edge.dst_host),
                    )
                    .with("index", index)
                    .with("src_host", &edge.src_host)
                    .with("dst_host", &edge.dst_host),
                );
            }
        }
        Ok(findings)
    }
}

/// Splunk-to-Splunk or HEC edge that is not known to be TLS-wrapped.
pub struct UnsecuredPipe;

impl Rule for UnsecuredPipe {
    fn code(&self) -> FindingCode {
        FindingCode::UnsecuredPipe
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Ok(ctx
            .graph
            .edges
            .iter()
            .filter(|e| e.protocol.expects_tls() && e.tls != Some(true) && !e.is_discard_only())
            .map(|edge| {
                let state = match edge.tls {
                    Some(_) => "without TLS",
                    None => "with unknown TLS",
                };
                Finding::new(
                    self.code(),
                    format!(
                        "{} edge {} -> {} {}",
                        edge.protocol, edge.src_host, edge.dst_host, state
                    ),
                )
                .with("src_host", &edge.src_host)
                .with("dst_host", &edge.dst_host)
                .with("protocol", edge.protocol.as_str())
                .with("tls", edge.tls)
            })
            .collect())
    }
}

pub struct DropPath;

impl Rule for DropPath {
    fn code(&self) -> FindingCode {
        FindingCode::DropPath
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Ok(ctx
            .graph
            .edges
            .iter()
            .filter(|e| !e.drop_rules.is_empty())
            .map(|edge| {
                let rules: Vec<&str> = edge.drop_rules.iter().map(String::as_str).collect();
                Finding::new(
                    self.code(),
                    format!(
                        "{} drops events bound for {} ({})",
                        edge.src_host,
                        edge.dst_host,
                        rules.join(", ")
                    ),
                )
                .with("src_host", &edge.src_host)
                .with("dst_host", &edge.dst_host)
                .with("drop_rules", rules.join(","))
                .with("fully_dropped", edge.indexes.is_empty())
            })
            .collect())
    }
}

/// Several tcpout groups and no default group among them.
pub struct AmbiguousGroup;

impl Rule for AmbiguousGroup {
    fn code(&self) -> FindingCode {
        FindingCode::AmbiguousGroup
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();
        for (host, trace) in &ctx.graph.meta.traceability.hosts {
            if trace.output_groups.len() < 2
                || trace.default_groups.iter().any(|g| trace.output_groups.contains(g))
            {
                continue;
            }
            let groups: Vec<&str> = trace.output_groups.iter().map(String::as_str).collect();
            findings.push(
                Finding::new(
                    self.code(),
                    format!(
                        "{} has {} tcpout groups and no defaultGroup",
                        host,
                        groups.len()
                    ),
                )
                .with("host", host)
                .with("groups", groups.join(","))
                .with("group_count", groups.len()),
            );
        }
        Ok(findings)
    }
}

/// Inputs whose outputs lead nowhere, and references to undefined groups.
pub struct MissingConfig;

impl Rule for MissingConfig {
    fn code(&self) -> FindingCode {
        FindingCode::MissingConfig
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();
        for (host, trace) in &ctx.graph.meta.traceability.hosts {
            if trace.input_count > 0 && trace.has_output_config && trace.resolvable_targets == 0 {
                findings.push(
                    Finding::new(
                        self.code(),
                        format!("{} has inputs but its outputs resolve to no destination", host),
                    )
                    .with("host", host)
                    .with("input_count", trace.input_count),
                );
            }
            for group in &trace.dangling_group_refs {
                findings.push(
                    Finding::new(
                        self.code(),
                        format!("{} routes to output group {}, which is not defined", host, group),
                    )
                    .with("host", host)
                    .with("group", group),
                );
            }
        }
        Ok(findings)
    }
}

/// Routing loops reachable from an uploaded host.
pub struct CircularRouting;

impl Rule for CircularRouting {
    fn code(&self) -> FindingCode {
        FindingCode::CircularRouting
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for edge in &ctx.graph.edges {
            adjacency
                .entry(edge.src_host.as_str())
                .or_default()
                .insert(edge.dst_host.as_str());
        }
        let starts = ctx.graph.meta.source_hosts.iter().map(String::as_str);

        Ok(find_cycles(&adjacency, starts)
            .into_iter()
            .map(|cycle| {
                let mut path = cycle.clone();
                path.push(cycle[0].clone());
                let rendered = path.join(" -> ");
                Finding::new(self.code(), format!("routing loop {}", rendered))
                    .with("cycle_start", &cycle[0])
                    .with("cycle", rendered)
                    .with("length", cycle.len())
            })
            .collect())
    }
}
