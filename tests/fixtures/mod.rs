//! Snapshot fixtures for integration tests
//!
//! Builds batch directories (one subdirectory per host, laid out like
//! `$SPLUNK_HOME/etc`) inside a `TempDir`, plus a few canned topologies.

#![allow(dead_code)]

use flowmap::config::Settings;
use flowmap::pipeline::{Pipeline, RunReport};
use flowmap::{CanonicalGraph, Edge};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A batch root under construction.
pub struct Batch {
    dir: TempDir,
}

impl Batch {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp batch root"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn host_dir(&self, host: &str) -> PathBuf {
        self.root().join(host)
    }

    /// Write `contents` to `<root>/<host>/<rel>`.
    pub fn write(&self, host: &str, rel: &str, contents: &str) -> &Self {
        let path = self.host_dir(host).join(rel);
        fs::create_dir_all(path.parent().expect("parent dir")).expect("create layer dir");
        fs::write(&path, contents).expect("write conf file");
        self
    }

    pub fn write_bytes(&self, host: &str, rel: &str, contents: &[u8]) -> &Self {
        let path = self.host_dir(host).join(rel);
        fs::create_dir_all(path.parent().expect("parent dir")).expect("create layer dir");
        fs::write(&path, contents).expect("write conf file");
        self
    }
}

pub fn run(batch: &Batch) -> RunReport {
    run_with(batch, &Settings::default())
}

pub fn run_with(batch: &Batch, settings: &Settings) -> RunReport {
    Pipeline::new(settings)
        .expect("valid settings")
        .run_batch(batch.root())
        .expect("pipeline run")
}

pub fn edge<'g>(graph: &'g CanonicalGraph, src: &str, dst: &str) -> &'g Edge {
    graph
        .edges
        .iter()
        .find(|e| e.src_host == src && e.dst_host == dst)
        .unwrap_or_else(|| panic!("no edge {} -> {}", src, dst))
}

pub fn has_edge(graph: &CanonicalGraph, src: &str, dst: &str) -> bool {
    graph.edges.iter().any(|e| e.src_host == src && e.dst_host == dst)
}

// =============================================================================
// Canned topologies
// =============================================================================

/// UF monitors `/var/log/messages` into `os`, forwards plain splunktcp to an
/// HF, which forwards over TLS to an indexer.
pub fn forwarding_chain(idx_declares_os: bool) -> Batch {
    let batch = Batch::new();
    batch
        .write(
            "uf01",
            "system/local/server.conf",
            "[general]\nserverName = uf01\n",
        )
        .write(
            "uf01",
            "apps/ta_nix/local/inputs.conf",
            "[monitor:///var/log/messages]\nindex = os\nsourcetype = syslog\n",
        )
        .write(
            "uf01",
            "system/local/outputs.conf",
            "[tcpout]\ndefaultGroup = hf\n\n[tcpout:hf]\nserver = hf01:9997\n",
        )
        .write(
            "hf01",
            "system/local/inputs.conf",
            "[splunktcp://9997]\nconnection_host = ip\n",
        )
        .write(
            "hf01",
            "system/local/outputs.conf",
            "[tcpout]\ndefaultGroup = idx\n\n[tcpout:idx]\nserver = idx01:9997\nuseSSL = true\n",
        )
        .write(
            "idx01",
            "system/local/inputs.conf",
            "[splunktcp-ssl://9997]\nconnection_host = ip\n",
        );
    if idx_declares_os {
        batch.write(
            "idx01",
            "apps/indexes/local/indexes.conf",
            "[os]\nhomePath = $SPLUNK_DB/os/db\ncoldPath = $SPLUNK_DB/os/colddb\n",
        );
    }
    batch
}

/// HF with two tcpout groups and no default group.
pub fn ambiguous_heavy_forwarder() -> Batch {
    let batch = Batch::new();
    batch
        .write(
            "hf01",
            "system/local/inputs.conf",
            "[monitor:///opt/app/logs]\nindex = app\n",
        )
        .write(
            "hf01",
            "system/local/outputs.conf",
            "[tcpout:east]\nserver = idx-east:9997\n\n[tcpout:west]\nserver = idx-west:9997\n",
        );
    batch
}

/// UF whose syslog events are sent to the null queue on the HF.
pub fn null_queue_chain() -> Batch {
    let batch = forwarding_chain(true);
    batch
        .write(
            "hf01",
            "apps/filters/local/props.conf",
            "[syslog]\nTRANSFORMS-null = setnull\n",
        )
        .write(
            "hf01",
            "apps/filters/local/transforms.conf",
            "[setnull]\nREGEX = .\nDEST_KEY = queue\nFORMAT = nullQueue\n",
        );
    batch
}

/// Three relays forwarding in a ring: a -> b -> c -> a.
pub fn routing_ring() -> Batch {
    let batch = Batch::new();
    for (host, next) in [("a", "b"), ("b", "c"), ("c", "a")] {
        batch
            .write(
                host,
                "system/local/inputs.conf",
                "[splunktcp://9997]\nconnection_host = ip\n",
            )
            .write(
                host,
                "system/local/outputs.conf",
                &format!("[tcpout]\ndefaultGroup = next\n\n[tcpout:next]\nserver = {}:9997\n", next),
            );
    }
    batch.write(
        "a",
        "apps/ta/local/inputs.conf",
        "[monitor:///var/log/a.log]\nindex = main\n",
    );
    batch
}
