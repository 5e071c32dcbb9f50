use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;
use tracing::debug;

use super::base::{label_names, metric_help, metric_name, Category, Measurement, SeriesLabels};
use super::retention::SeriesTracker;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("{0} has no inode gauges")]
    NoInodes(Category),
    #[error("no gauge family registered for {0}_{1}")]
    UnknownFamily(Category, &'static str),
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),
    #[error("failed to encode metrics: {0}")]
    Encode(String),
}

/// Knobs fixed when the registry is built.
#[derive(Debug, Clone, Default)]
pub struct MetricsOptions {
    /// Prepended as `<prefix>_` to every metric name when non-empty.
    pub prefix: String,
    /// Add the pod UID as a `uid` label on every storage series.
    pub uid_label: bool,
    /// Drop series not reported for this many successful cycles; 0 keeps them forever.
    pub stale_cycles: u32,
}

/// The exporter's gauges, owned by one `prometheus::Registry`.
///
/// Storage gauges live in a table keyed by (category, measurement). Each
/// gauge is an atomic, so scrapes can render while the collector writes;
/// a scrape may see a mix of this cycle's and the previous cycle's values.
pub struct Metrics {
    registry: Registry,
    options: MetricsOptions,
    families: BTreeMap<(Category, Measurement), GaugeVec>,
    api_status: GaugeVec,
    api_latency: GaugeVec,
    last_success: GaugeVec,
    scrape_errors: IntCounterVec,
    series: Mutex<SeriesTracker>,
    // (node, error kind) tuples written on the API families
    api_series: Mutex<BTreeSet<(String, Option<String>)>>,
}

impl Metrics {
    pub fn new(options: MetricsOptions) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let mut families = BTreeMap::new();
        for category in Category::ALL {
            let labels = label_names(category.scope(), options.uid_label);
            for &measurement in category.measurements() {
                let gauge = GaugeVec::new(
                    Opts::new(
                        metric_name(&options.prefix, category, measurement),
                        metric_help(category, measurement),
                    ),
                    &labels,
                )?;
                registry.register(Box::new(gauge.clone()))?;
                families.insert((category, measurement), gauge);
            }
        }

        let api_status = node_gauge(
            &registry,
            &options.prefix,
            "api_status",
            "Summary API status on the target node (0 is down, 1 is up)",
        )?;
        let api_latency = node_gauge(
            &registry,
            &options.prefix,
            "api_latency_seconds",
            "Summary API response time in seconds",
        )?;
        let last_success = node_gauge(
            &registry,
            &options.prefix,
            "last_success_timestamp_seconds",
            "Unix time of the last successful summary collection",
        )?;

        let scrape_errors = IntCounterVec::new(
            Opts::new(
                prefixed(&options.prefix, "scrape_errors_total"),
                "Failed summary collections by error kind",
            ),
            &["node", "kind"],
        )?;
        registry.register(Box::new(scrape_errors.clone()))?;

        debug!(families = families.len(), prefix = %options.prefix, "registered storage gauges");

        Ok(Self {
            registry,
            series: Mutex::new(SeriesTracker::new(options.stale_cycles)),
            api_series: Mutex::new(BTreeSet::new()),
            options,
            families,
            api_status,
            api_latency,
            last_success,
            scrape_errors,
        })
    }

    /// Overwrites the used/available/capacity gauges of one series.
    pub fn set_bytes(
        &self,
        category: Category,
        labels: &SeriesLabels,
        used: f64,
        available: f64,
        capacity: f64,
    ) -> Result<(), MetricsError> {
        self.set_group(category, labels, Measurement::BYTES, [used, available, capacity])
    }

    /// Overwrites the used/free/total inode gauges of one series.
    pub fn set_inodes(
        &self,
        category: Category,
        labels: &SeriesLabels,
        used: f64,
        free: f64,
        total: f64,
    ) -> Result<(), MetricsError> {
        if !category.has_inodes() {
            return Err(MetricsError::NoInodes(category));
        }
        self.set_group(category, labels, Measurement::INODES, [used, free, total])
    }

    fn set_group(
        &self,
        category: Category,
        labels: &SeriesLabels,
        measurements: [Measurement; 3],
        values: [f64; 3],
    ) -> Result<(), MetricsError> {
        let labels = self.normalize(labels);
        let label_values = labels.values(self.options.uid_label);
        for (measurement, value) in measurements.into_iter().zip(values) {
            self.family(category, measurement)?
                .get_metric_with_label_values(label_values.as_slice())?
                .set(value);
        }
        self.tracker().touch(category, &labels);
        Ok(())
    }

    /// Current value of one gauge, or `None` if the series was never written.
    pub fn value(
        &self,
        category: Category,
        measurement: Measurement,
        labels: &SeriesLabels,
    ) -> Option<f64> {
        let labels = self.normalize(labels);
        if !self.tracker().contains(category, &labels) {
            return None;
        }
        let family = self.family(category, measurement).ok()?;
        family
            .get_metric_with_label_values(labels.values(self.options.uid_label).as_slice())
            .ok()
            .map(|gauge| gauge.get())
    }

    /// Number of distinct storage series (label tuple per category) currently exported.
    pub fn series_count(&self) -> usize {
        self.tracker().len()
    }

    /// Ends a successful collection cycle, removing series that went stale.
    /// Returns how many series were removed.
    pub fn finish_cycle(&self) -> usize {
        let expired = self.tracker().finish_cycle();
        for (category, labels) in &expired {
            let label_values = labels.values(self.options.uid_label);
            for &measurement in category.measurements() {
                if let Some(family) = self.families.get(&(*category, measurement)) {
                    // absent series are fine: nothing to remove
                    let _ = family.remove_label_values(label_values.as_slice());
                }
            }
            debug!(category = %category, pod = %labels.pod, namespace = %labels.namespace, "pruned stale series");
        }
        expired.len()
    }

    pub fn set_api_up(&self, node: &str, latency: Duration, timestamp: i64) {
        self.api_status.with_label_values(&[node]).set(1.0);
        self.api_latency.with_label_values(&[node]).set(latency.as_secs_f64());
        self.last_success.with_label_values(&[node]).set(timestamp as f64);
        lock(&self.api_series).insert((node.to_string(), None));
    }

    pub fn set_api_down(&self, node: &str, latency: Duration, kind: &str) {
        self.api_status.with_label_values(&[node]).set(0.0);
        self.api_latency.with_label_values(&[node]).set(latency.as_secs_f64());
        self.scrape_errors.with_label_values(&[node, kind]).inc();
        let mut written = lock(&self.api_series);
        written.insert((node.to_string(), None));
        written.insert((node.to_string(), Some(kind.to_string())));
    }

    /// Last recorded API status of `node`, or `None` before its first fetch.
    /// Like `value()`, reading never creates a series.
    pub fn api_status(&self, node: &str) -> Option<f64> {
        if !lock(&self.api_series).contains(&(node.to_string(), None)) {
            return None;
        }
        Some(self.api_status.with_label_values(&[node]).get())
    }

    /// Failed collections of `node` with the given error kind.
    pub fn scrape_errors(&self, node: &str, kind: &str) -> u64 {
        let key = (node.to_string(), Some(kind.to_string()));
        if !lock(&self.api_series).contains(&key) {
            return 0;
        }
        self.scrape_errors.with_label_values(&[node, kind]).get()
    }

    /// Renders every registered metric in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encode(e.to_string()))
    }

    fn family(&self, category: Category, measurement: Measurement) -> Result<&GaugeVec, MetricsError> {
        self.families
            .get(&(category, measurement))
            .ok_or(MetricsError::UnknownFamily(category, measurement.as_str()))
    }

    /// Without a `uid` label, series that differ only by UID are the same series.
    fn normalize(&self, labels: &SeriesLabels) -> SeriesLabels {
        let mut labels = labels.clone();
        if !self.options.uid_label {
            labels.uid = None;
        }
        labels
    }

    fn tracker(&self) -> MutexGuard<'_, SeriesTracker> {
        lock(&self.series)
    }
}

// Neither guarded set holds an invariant a panicking writer could break.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn prefixed(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", prefix, name)
    }
}

fn node_gauge(registry: &Registry, prefix: &str, name: &str, help: &str) -> Result<GaugeVec, MetricsError> {
    let gauge = GaugeVec::new(Opts::new(prefixed(prefix, name), help), &["node"])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web0() -> SeriesLabels {
        SeriesLabels::pod("web-0", "default", "n1", Some("uid-1"))
    }

    #[test]
    fn test_registers_every_family() {
        let metrics = Metrics::new(MetricsOptions::default()).unwrap();
        assert_eq!(metrics.families.len(), 27);
    }

    #[test]
    fn test_set_and_read_back() {
        let metrics = Metrics::new(MetricsOptions::default()).unwrap();
        metrics
            .set_bytes(Category::EphemeralStorage, &web0(), 100.0, 900.0, 1000.0)
            .unwrap();
        metrics
            .set_inodes(Category::EphemeralStorage, &web0(), 10.0, 40.0, 50.0)
            .unwrap();

        let read = |m| metrics.value(Category::EphemeralStorage, m, &web0());
        assert_eq!(read(Measurement::UsageBytes), Some(100.0));
        assert_eq!(read(Measurement::AvailableBytes), Some(900.0));
        assert_eq!(read(Measurement::CapacityBytes), Some(1000.0));
        assert_eq!(read(Measurement::InodesUsed), Some(10.0));
        assert_eq!(read(Measurement::InodesFree), Some(40.0));
        assert_eq!(read(Measurement::InodesTotal), Some(50.0));
        assert_eq!(metrics.series_count(), 1);
    }

    #[test]
    fn test_value_does_not_create_series() {
        let metrics = Metrics::new(MetricsOptions::default()).unwrap();
        assert_eq!(
            metrics.value(Category::EphemeralStorage, Measurement::UsageBytes, &web0()),
            None
        );
        assert!(!metrics.encode().unwrap().contains("web-0"));
    }

    #[test]
    fn test_set_is_idempotent() {
        let metrics = Metrics::new(MetricsOptions::default()).unwrap();
        let app = web0().with_object("app");
        for _ in 0..2 {
            metrics
                .set_bytes(Category::ContainerMemory, &app, 20.0, 80.0, 100.0)
                .unwrap();
        }
        assert_eq!(
            metrics.value(Category::ContainerMemory, Measurement::UsageBytes, &app),
            Some(20.0)
        );
        assert_eq!(metrics.series_count(), 1);
    }

    #[test]
    fn test_memory_has_no_inodes() {
        let metrics = Metrics::new(MetricsOptions::default()).unwrap();
        let app = web0().with_object("app");
        let err = metrics
            .set_inodes(Category::ContainerMemory, &app, 1.0, 2.0, 3.0)
            .unwrap_err();
        assert!(matches!(err, MetricsError::NoInodes(Category::ContainerMemory)));
        assert_eq!(metrics.series_count(), 0);
    }

    #[test]
    fn test_label_cardinality_mismatch_is_an_error() {
        let metrics = Metrics::new(MetricsOptions::default()).unwrap();
        // container families need a container label
        let result = metrics.set_bytes(Category::ContainerRootfs, &web0(), 1.0, 2.0, 3.0);
        assert!(matches!(result, Err(MetricsError::Prometheus(_))));
    }

    #[test]
    fn test_encode_uses_prefix_and_uid() {
        let metrics = Metrics::new(MetricsOptions {
            prefix: "ls_ex".to_string(),
            uid_label: true,
            stale_cycles: 0,
        })
        .unwrap();
        metrics
            .set_bytes(Category::PodVolume, &web0().with_object("data"), 30.0, 70.0, 100.0)
            .unwrap();

        let text = metrics.encode().unwrap();
        assert!(text.contains("# TYPE ls_ex_pod_volume_usage_bytes gauge"));
        assert!(text.contains(
            r#"ls_ex_pod_volume_usage_bytes{namespace="default",node="n1",pod="web-0",uid="uid-1",volume="data"} 30"#
        ));
    }

    #[test]
    fn test_finish_cycle_prunes_when_enabled() {
        let metrics = Metrics::new(MetricsOptions {
            stale_cycles: 1,
            ..Default::default()
        })
        .unwrap();
        metrics
            .set_bytes(Category::EphemeralStorage, &web0(), 1.0, 2.0, 3.0)
            .unwrap();
        assert_eq!(metrics.finish_cycle(), 0);
        assert_eq!(metrics.finish_cycle(), 1);

        assert_eq!(
            metrics.value(Category::EphemeralStorage, Measurement::UsageBytes, &web0()),
            None
        );
        assert!(!metrics.encode().unwrap().contains("web-0"));
    }

    #[test]
    fn test_api_gauges() {
        let metrics = Metrics::new(MetricsOptions::default()).unwrap();
        metrics.set_api_up("n1", Duration::from_millis(250), 1_700_000_000);
        assert_eq!(metrics.api_status("n1"), Some(1.0));

        metrics.set_api_down("n1", Duration::from_millis(10), "status");
        metrics.set_api_down("n1", Duration::from_millis(10), "status");
        assert_eq!(metrics.api_status("n1"), Some(0.0));
        assert_eq!(metrics.scrape_errors("n1", "status"), 2);
        assert_eq!(metrics.scrape_errors("n1", "timeout"), 0);

        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"last_success_timestamp_seconds{node="n1"} 1700000000"#));
        assert!(text.contains(r#"api_latency_seconds{node="n1"} 0.01"#));
    }

    #[test]
    fn test_api_reads_do_not_create_series() {
        let metrics = Metrics::new(MetricsOptions::default()).unwrap();
        assert_eq!(metrics.api_status("n2"), None);
        assert_eq!(metrics.scrape_errors("n2", "timeout"), 0);

        metrics.set_api_down("n1", Duration::from_millis(10), "status");
        assert_eq!(metrics.scrape_errors("n1", "decode"), 0);

        let text = metrics.encode().unwrap();
        assert!(!text.contains(r#"node="n2""#));
        assert!(!text.contains(r#"kind="decode""#));
        assert!(text.contains(r#"scrape_errors_total{kind="status",node="n1"} 1"#));
    }
}
