//! Identical configuration must produce an identical graph
//!
//! Digests exclude `meta.generated_at`, so two runs over the same content
//! (even from different directories, written in a different order) agree.

mod fixtures;

use fixtures::Batch;
use flowmap_model::{Confidence, Edge, EdgeKey, PathKind, Protocol};

fn chain_in_order(reverse: bool) -> Batch {
    let files: Vec<(&str, &str, &str)> = vec![
        ("uf01", "apps/ta_nix/local/inputs.conf", "[monitor:///var/log/messages]\nindex = os\nsourcetype = syslog\n"),
        ("uf01", "apps/ta_web/default/inputs.conf", "[monitor:///var/log/nginx/access.log]\nindex = web\n"),
        ("uf01", "system/local/outputs.conf", "[tcpout]\ndefaultGroup = hf\n\n[tcpout:hf]\nserver = hf01:9997, hf02:9997\n"),
        ("hf01", "system/local/inputs.conf", "[splunktcp://9997]\n"),
        ("hf01", "system/local/outputs.conf", "[tcpout:idx]\nserver = idx01:9997\nuseSSL = true\n"),
        ("hf02", "system/local/inputs.conf", "[splunktcp://9997]\n"),
        ("hf02", "system/local/outputs.conf", "[tcpout:idx]\nserver = idx01:9997\n"),
        ("idx01", "system/local/inputs.conf", "[splunktcp://9997]\n"),
        ("idx01", "system/local/indexes.conf", "[os]\n\n[web]\n"),
    ];
    let batch = Batch::new();
    let ordered: Box<dyn Iterator<Item = &(&str, &str, &str)>> = if reverse {
        Box::new(files.iter().rev())
    } else {
        Box::new(files.iter())
    };
    for (host, rel, contents) in ordered {
        batch.write(host, rel, contents);
    }
    batch
}

#[test]
fn test_repeated_runs_share_digest() {
    let batch = chain_in_order(false);
    let first = fixtures::run(&batch);
    let second = fixtures::run(&batch);

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.summary.graph_digest, second.summary.graph_digest);
    assert_eq!(first.graph.edges, second.graph.edges);
    assert_eq!(first.report.findings, second.report.findings);
}

#[test]
fn test_digest_independent_of_location_and_write_order() {
    let forward = fixtures::run(&chain_in_order(false));
    let backward = fixtures::run(&chain_in_order(true));

    assert_eq!(forward.graph.digest().unwrap(), backward.graph.digest().unwrap());
    assert_eq!(
        forward.graph.to_canonical_json().unwrap().len(),
        backward.graph.to_canonical_json().unwrap().len()
    );
}

#[test]
fn test_relays_converge_on_both_paths() {
    let run = fixtures::run(&chain_in_order(false));
    let graph = &run.graph;

    for hf in ["hf01", "hf02"] {
        let out = fixtures::edge(graph, hf, "idx01");
        let indexes: Vec<&str> = out.indexes.iter().map(String::as_str).collect();
        assert_eq!(indexes, vec!["os", "web"]);
    }
    assert_eq!(fixtures::edge(graph, "hf01", "idx01").tls, Some(true));
    assert_eq!(fixtures::edge(graph, "hf02", "idx01").tls, Some(false));
    // Both monitor inputs land on each HF edge of the UF.
    assert_eq!(fixtures::edge(graph, "uf01", "hf01").weight, 2);
}

// =============================================================================
// Edge folding
// =============================================================================

fn contribution(source: &str, index: &str, app: &str, tls: Option<bool>) -> Edge {
    let mut edge = Edge::new(EdgeKey {
        src_host: "uf01".to_string(),
        dst_host: "hf01".to_string(),
        protocol: Protocol::Splunktcp,
        path_kind: PathKind::Forwarding,
    });
    edge.sources.insert(source.to_string());
    edge.indexes.insert(index.to_string());
    edge.app_contexts.insert(app.to_string());
    edge.tls = tls;
    edge.weight = 1;
    edge
}

#[test]
fn test_absorb_order_does_not_matter_for_sets_and_weight() {
    let parts = vec![
        contribution("monitor:///a", "os", "ta_nix", Some(true)),
        contribution("monitor:///b", "web", "ta_web", None),
        contribution("monitor:///c", "os", "ta_nix", Some(false)),
    ];

    let fold = |order: &[usize]| {
        let mut acc = parts[order[0]].clone();
        for &i in &order[1..] {
            acc.absorb(parts[i].clone());
        }
        acc
    };

    let a = fold(&[0, 1, 2]);
    let b = fold(&[2, 0, 1]);
    assert_eq!(a.sources, b.sources);
    assert_eq!(a.indexes, b.indexes);
    assert_eq!(a.app_contexts, b.app_contexts);
    assert_eq!(a.weight, 3);
    assert_eq!(b.weight, 3);
    assert_eq!(a.tls, Some(false));
    assert_eq!(b.tls, Some(false));
    assert_eq!(a.confidence, Confidence::Explicit);
}
