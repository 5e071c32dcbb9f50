// Public modules
pub mod types;
pub mod config;
pub mod parsing;
pub mod fetch;
pub mod metrics;
pub mod collector;
pub mod report;
pub mod server;

// Re-export commonly used items
pub use types::*;
pub use config::{load_config, load_config_with_env, EnvironmentProvider, SystemEnvironment, MockEnvironment};
pub use parsing::{parse_duration, parse_bool, to_gauge_value};
pub use fetch::{summary_endpoint, FetchError, SummaryClient};
pub use metrics::{Category, Measurement, Metrics, MetricsError, MetricsOptions, SeriesLabels};
pub use collector::{CollectorOptions, MetricsCollector};
pub use report::CycleReport;
