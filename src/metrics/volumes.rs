use crate::parsing::to_gauge_value;
use crate::types::VolumeSummary;

use super::base::{Category, SeriesLabels};
use super::registry::{Metrics, MetricsError};

/// Publishes usage of one volume mounted into the pod identified by `pod_labels`.
pub fn record_volume(
    metrics: &Metrics,
    volume: &VolumeSummary,
    pod_labels: &SeriesLabels,
) -> Result<(), MetricsError> {
    let labels = pod_labels.with_object(&volume.name);
    let fs = &volume.fs;
    metrics.set_bytes(
        Category::PodVolume,
        &labels,
        to_gauge_value(fs.used_bytes),
        to_gauge_value(fs.available_bytes),
        to_gauge_value(fs.capacity_bytes),
    )?;
    metrics.set_inodes(
        Category::PodVolume,
        &labels,
        to_gauge_value(fs.inodes_used),
        to_gauge_value(fs.inodes_free),
        to_gauge_value(fs.inodes),
    )
}
