// HTTP API controllers for revoke administration endpoints.

pub mod controller;
pub mod metrics;
pub mod probe;
pub mod revoke;
pub mod stats;

// Re-export controller types for convenience
pub use metrics::PrometheusMetricsController;
pub use probe::LivenessProbeController;
pub use revoke::RevokeController;
pub use stats::StatsController;
