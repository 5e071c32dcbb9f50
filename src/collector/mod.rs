use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::fetch::{FetchError, SummaryClient};
use crate::metrics::{self, Metrics};
use crate::report::CycleReport;
use crate::types::Summary;

#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub interval: Duration,
    /// Used for the API gauges and when the kubelet reports no node name.
    pub node_name: String,
}

/// Periodically pulls the kubelet summary and folds it into the registry.
///
/// A failed cycle is logged and leaves the storage gauges as they were;
/// the loop itself only ends when the shutdown future resolves.
pub struct MetricsCollector {
    client: SummaryClient,
    metrics: Arc<Metrics>,
    options: CollectorOptions,
}

impl MetricsCollector {
    pub fn new(client: SummaryClient, metrics: Arc<Metrics>, options: CollectorOptions) -> Self {
        Self {
            client,
            metrics,
            options,
        }
    }

    /// Runs until `shutdown` resolves. The first poll happens immediately;
    /// later ones are spaced `interval` apart. An in-flight fetch is
    /// abandoned as soon as shutdown is requested.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            endpoint = %self.client.endpoint(),
            interval = ?self.options.interval,
            timeout = ?self.client.timeout(),
            "starting kubelet summary collector"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.poll_once() => {}
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.options.interval) => {}
            }
        }

        info!("kubelet summary collector stopped");
    }

    /// One fetch, decode and fan-out. Failures are logged and recorded on the
    /// API gauges; storage gauges are only touched on success.
    pub async fn poll_once(&self) -> Result<CycleReport, FetchError> {
        debug!("fetching kubelet summary for storage usage metrics");
        let started = Instant::now();

        match self.client.fetch().await {
            Ok(summary) => {
                let latency = started.elapsed();
                let report = self.apply(&summary);
                self.metrics
                    .set_api_up(&self.options.node_name, latency, Utc::now().timestamp());
                if report.has_errors() {
                    warn!(%report, "updated storage usage metrics with errors");
                } else {
                    debug!(%report, latency = ?latency, "updated storage usage metrics");
                }
                Ok(report)
            }
            Err(err) => {
                self.metrics
                    .set_api_down(&self.options.node_name, started.elapsed(), err.kind());
                error!(
                    endpoint = %self.client.endpoint(),
                    node = %self.options.node_name,
                    kind = err.kind(),
                    error = %err,
                    "failed to collect kubelet summary"
                );
                Err(err)
            }
        }
    }

    /// Writes every pod, volume and container of `summary` into the registry,
    /// in payload order. A gauge that cannot be written is logged and skipped;
    /// whatever was written before stays written.
    pub fn apply(&self, summary: &Summary) -> CycleReport {
        let node = summary.node_name_or(&self.options.node_name);
        let mut report = CycleReport::new(node);

        for pod in &summary.pods {
            let labels = metrics::pod_labels(pod, node);

            match metrics::record_ephemeral_storage(&self.metrics, pod, &labels) {
                Ok(()) => report.add_pod(),
                Err(err) => {
                    report.add_error();
                    warn!(pod = %labels.pod, namespace = %labels.namespace, error = %err, "failed to set ephemeral storage gauges");
                }
            }

            for volume in &pod.volumes {
                match metrics::record_volume(&self.metrics, volume, &labels) {
                    Ok(()) => report.add_volume(),
                    Err(err) => {
                        report.add_error();
                        warn!(pod = %labels.pod, volume = %volume.name, error = %err, "failed to set volume gauges");
                    }
                }
            }

            for container in &pod.containers {
                match metrics::record_container(&self.metrics, container, &labels) {
                    Ok(()) => report.add_container(),
                    Err(err) => {
                        report.add_error();
                        warn!(pod = %labels.pod, container = %container.name, error = %err, "failed to set container gauges");
                    }
                }
            }
        }

        report.pruned = self.metrics.finish_cycle();
        report
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Category, Measurement, MetricsOptions, SeriesLabels};

    fn collector(node_name: &str) -> MetricsCollector {
        let metrics = Arc::new(Metrics::new(MetricsOptions::default()).unwrap());
        let client = SummaryClient::new(
            "http://127.0.0.1:1/stats/summary",
            "/nonexistent/client.pem",
            "/nonexistent/client.pem",
            Duration::from_secs(1),
        );
        MetricsCollector::new(
            client,
            metrics,
            CollectorOptions {
                interval: Duration::from_secs(10),
                node_name: node_name.to_string(),
            },
        )
    }

    fn summary(json: &str) -> Summary {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_apply_counts_objects() {
        let collector = collector("n1");
        let report = collector.apply(&summary(
            r#"{"node": {"nodeName": "n1"}, "pods": [
                {"podRef": {"name": "a", "namespace": "ns"},
                 "containers": [{"name": "c1"}, {"name": "c2"}],
                 "volume": [{"name": "v1"}]},
                {"podRef": {"name": "b", "namespace": "ns"}}
            ]}"#,
        ));

        assert_eq!(report.node, "n1");
        assert_eq!(report.pods, 2);
        assert_eq!(report.containers, 2);
        assert_eq!(report.volumes, 1);
        assert_eq!(report.series_updated, 2 + 1 + 2 * 3);
        assert_eq!(report.errors, 0);
        assert_eq!(collector.metrics().series_count(), 9);
    }

    #[test]
    fn test_apply_falls_back_to_configured_node() {
        let collector = collector("configured");
        let report = collector.apply(&summary(
            r#"{"node": {"nodeName": ""}, "pods": [{"podRef": {"name": "a", "namespace": "ns"},
                "ephemeral-storage": {"usedBytes": 5}}]}"#,
        ));

        assert_eq!(report.node, "configured");
        let labels = SeriesLabels::pod("a", "ns", "configured", None);
        assert_eq!(
            collector
                .metrics()
                .value(Category::EphemeralStorage, Measurement::UsageBytes, &labels),
            Some(5.0)
        );
    }

    #[tokio::test]
    async fn test_poll_failure_leaves_storage_gauges() {
        let collector = collector("n1");
        collector.apply(&summary(
            r#"{"node": {"nodeName": "n1"}, "pods": [{"podRef": {"name": "a", "namespace": "ns"},
                "ephemeral-storage": {"usedBytes": 5}}]}"#,
        ));

        let err = collector.poll_once().await.unwrap_err();
        assert_eq!(err.kind(), "certificate");

        let labels = SeriesLabels::pod("a", "ns", "n1", None);
        assert_eq!(
            collector
                .metrics()
                .value(Category::EphemeralStorage, Measurement::UsageBytes, &labels),
            Some(5.0)
        );
        assert_eq!(collector.metrics().api_status("n1"), Some(0.0));
        assert_eq!(collector.metrics().scrape_errors("n1", "certificate"), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let collector = collector("n1");
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), collector.run(async {
            let _ = rx.await;
        }))
        .await
        .expect("collector did not stop");
    }
}
