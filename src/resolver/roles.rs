//! Role and label inference from the stanza kinds a host carries.

use flowmap_conf::HostConfig;
use flowmap_model::Role;
use std::collections::BTreeSet;

pub fn infer_roles(host: &HostConfig) -> BTreeSet<Role> {
    let mut roles = BTreeSet::new();
    let has_inputs = !host.inputs.is_empty();

    if (has_inputs && !host.has_output_config()) || host.index_and_forward() {
        roles.insert(Role::Indexer);
    }
    if has_inputs && host.has_output_config() {
        if host.parses_data() || !host.transforms.is_empty() {
            roles.insert(Role::HeavyForwarder);
        } else {
            roles.insert(Role::UniversalForwarder);
        }
    }
    if host.has_hec_inputs() {
        roles.insert(Role::HecReceiver);
    }
    match host.clustering_mode().as_deref() {
        Some("manager" | "master") => {
            roles.insert(Role::ClusterManager);
        }
        Some("peer" | "slave") => {
            roles.insert(Role::ClusterPeer);
        }
        _ => {}
    }
    roles
}

pub fn infer_labels(host: &HostConfig) -> BTreeSet<String> {
    let mut labels = BTreeSet::new();
    if let Some(label) = host.cluster_label().map(str::trim).filter(|l| !l.is_empty()) {
        labels.insert(format!("cluster:{}", label));
    }
    if let Some(site) = host.site().map(str::trim).filter(|s| !s.is_empty()) {
        labels.insert(format!("site:{}", site));
    }
    labels
}
