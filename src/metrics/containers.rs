use crate::parsing::to_gauge_value;
use crate::types::{ContainerSummary, FsStats};

use super::base::{Category, SeriesLabels};
use super::registry::{Metrics, MetricsError};

/// Publishes memory, rootfs and log usage of one container of the pod
/// identified by `pod_labels`.
pub fn record_container(
    metrics: &Metrics,
    container: &ContainerSummary,
    pod_labels: &SeriesLabels,
) -> Result<(), MetricsError> {
    let labels = pod_labels.with_object(&container.name);

    let memory = &container.memory;
    metrics.set_bytes(
        Category::ContainerMemory,
        &labels,
        to_gauge_value(memory.usage_bytes),
        to_gauge_value(memory.available_bytes),
        to_gauge_value(memory.capacity_bytes),
    )?;

    record_fs(metrics, Category::ContainerRootfs, &container.rootfs, &labels)?;
    record_fs(metrics, Category::ContainerLogs, &container.logs, &labels)
}

fn record_fs(
    metrics: &Metrics,
    category: Category,
    fs: &FsStats,
    labels: &SeriesLabels,
) -> Result<(), MetricsError> {
    metrics.set_bytes(
        category,
        labels,
        to_gauge_value(fs.used_bytes),
        to_gauge_value(fs.available_bytes),
        to_gauge_value(fs.capacity_bytes),
    )?;
    metrics.set_inodes(
        category,
        labels,
        to_gauge_value(fs.inodes_used),
        to_gauge_value(fs.inodes_free),
        to_gauge_value(fs.inodes),
    )
}
