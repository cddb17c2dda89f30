//! Cycle detection over the host adjacency.

use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Elementary cycles among hosts reachable from `starts`. Each cycle is
/// reported once, rotated to begin at its smallest host.
///
/// Every reachable host roots one search that only walks through larger
/// hosts, so a cycle is found exactly once: from its smallest member.
pub fn find_cycles<'a>(
    adjacency: &BTreeMap<&'a str, BTreeSet<&'a str>>,
    starts: impl IntoIterator<Item = &'a str>,
) -> Vec<Vec<String>> {
    let empty = BTreeSet::new();
    let successors = |node: &str| adjacency.get(node).unwrap_or(&empty).iter().copied();
    let mut found: BTreeSet<Vec<String>> = BTreeSet::new();

    for root in reachable(adjacency, starts) {
        let mut path = vec![root];
        let mut on_path: HashSet<&str> = HashSet::from([root]);
        let mut stack = vec![successors(root)];

        while let Some(neighbors) = stack.last_mut() {
            match neighbors.next() {
                Some(next) if next == root => {
                    found.insert(path.iter().map(|n| n.to_string()).collect());
                }
                Some(next) if next > root && !on_path.contains(next) => {
                    path.push(next);
                    on_path.insert(next);
                    stack.push(successors(next));
                }
                Some(_) => {}
                None => {
                    stack.pop();
                    if let Some(done) = path.pop() {
                        on_path.remove(done);
                    }
                }
            }
        }
    }

    found.into_iter().collect()
}

fn reachable<'a>(
    adjacency: &BTreeMap<&'a str, BTreeSet<&'a str>>,
    starts: impl IntoIterator<Item = &'a str>,
) -> BTreeSet<&'a str> {
    let mut seen: BTreeSet<&'a str> = BTreeSet::new();
    let mut pending: Vec<&'a str> = starts.into_iter().collect();
    while let Some(node) = pending.pop() {
        if seen.insert(node) {
            if let Some(next) = adjacency.get(node) {
                pending.extend(next.iter().copied().filter(|n| !seen.contains(n)));
            }
        }
    }
    seen
}
