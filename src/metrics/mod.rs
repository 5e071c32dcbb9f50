// Gauge registry and the per-object fan-out onto it
pub mod base;
pub mod registry;
pub mod retention;
pub mod pods;
pub mod volumes;
pub mod containers;

// Re-export commonly used items
pub use base::{Category, Measurement, Scope, SeriesLabels};
pub use registry::{Metrics, MetricsError, MetricsOptions};
pub use pods::{pod_labels, record_ephemeral_storage};
pub use volumes::record_volume;
pub use containers::record_container;
