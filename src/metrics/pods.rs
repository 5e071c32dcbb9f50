use crate::parsing::to_gauge_value;
use crate::types::PodSummary;

use super::base::{Category, SeriesLabels};
use super::registry::{Metrics, MetricsError};

/// Labels shared by every series of a pod.
pub fn pod_labels(pod: &PodSummary, node: &str) -> SeriesLabels {
    SeriesLabels::pod(
        &pod.pod_ref.name,
        &pod.pod_ref.namespace,
        node,
        pod.pod_ref.uid.as_deref(),
    )
}

/// Publishes a pod's ephemeral storage usage (bytes and inodes).
pub fn record_ephemeral_storage(
    metrics: &Metrics,
    pod: &PodSummary,
    labels: &SeriesLabels,
) -> Result<(), MetricsError> {
    let fs = &pod.ephemeral_storage;
    metrics.set_bytes(
        Category::EphemeralStorage,
        labels,
        to_gauge_value(fs.used_bytes),
        to_gauge_value(fs.available_bytes),
        to_gauge_value(fs.capacity_bytes),
    )?;
    metrics.set_inodes(
        Category::EphemeralStorage,
        labels,
        to_gauge_value(fs.inodes_used),
        to_gauge_value(fs.inodes_free),
        to_gauge_value(fs.inodes),
    )
}
