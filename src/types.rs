use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub debug: bool,
    pub json_log: bool,
    pub interval: Duration,
    pub timeout: Duration,
    pub node_name: String,
    pub cert_file: String,
    pub key_file: String,
    pub k8s_local_api: String,
    pub metrics_prefix: String,
    pub uid_label: bool,
    pub stale_cycles: u32,
}

/// Decoded body of the kubelet `/stats/summary` endpoint.
///
/// Only the parts the exporter republishes are modeled; everything else in
/// the payload is ignored during decoding.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub node: NodeSummary,
    #[serde(default)]
    pub pods: Vec<PodSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    #[serde(default)]
    pub node_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSummary {
    pub pod_ref: PodReference,
    #[serde(default, rename = "ephemeral-storage")]
    pub ephemeral_storage: FsStats,
    #[serde(default)]
    pub containers: Vec<ContainerSummary>,
    #[serde(default, rename = "volume")]
    pub volumes: Vec<VolumeSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodReference {
    pub name: String,
    pub namespace: String,
    // older kubelets omit it
    #[serde(default)]
    pub uid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSummary {
    pub name: String,
    #[serde(default)]
    pub memory: MemoryStats,
    #[serde(default)]
    pub rootfs: FsStats,
    #[serde(default)]
    pub logs: FsStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSummary {
    pub name: String,
    #[serde(flatten)]
    pub fs: FsStats,
}

/// Filesystem usage as reported for ephemeral storage, rootfs, logs and volumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsStats {
    #[serde(default)]
    pub used_bytes: u64,
    #[serde(default)]
    pub available_bytes: u64,
    #[serde(default)]
    pub capacity_bytes: u64,
    #[serde(default)]
    pub inodes: u64,
    #[serde(default)]
    pub inodes_free: u64,
    #[serde(default)]
    pub inodes_used: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    #[serde(default)]
    pub usage_bytes: u64,
    #[serde(default)]
    pub available_bytes: u64,
    #[serde(default)]
    pub capacity_bytes: u64,
}

impl Summary {
    /// Node label for this payload, falling back when the kubelet left it blank.
    pub fn node_name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.node.node_name.is_empty() {
            fallback
        } else {
            &self.node.node_name
        }
    }
}
