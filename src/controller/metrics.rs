//! Metrics controller.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};

use crate::http::Controller;
use crate::metrics;

pub const PROMETHEUS_METRICS_PATH: &str = "/metrics";

const NOT_INSTALLED: &str = "# metrics exporter is not installed\n";

/// PrometheusMetricsController renders the installed Prometheus recorder.
pub struct PrometheusMetricsController;

impl PrometheusMetricsController {
    pub fn new() -> Self {
        Self
    }

    async fn get_metrics() -> impl IntoResponse {
        let body = metrics::render().unwrap_or_else(|| NOT_INSTALLED.to_string());
        (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            body,
        )
    }
}

impl Default for PrometheusMetricsController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for PrometheusMetricsController {
    fn add_route(&self, router: Router) -> Router {
        router.route(PROMETHEUS_METRICS_PATH, get(Self::get_metrics))
    }
}
