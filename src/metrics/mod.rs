//! Prometheus metrics for revoke processing.
//
//! Counters are accumulated in `revoke::Counters` on the hot path and flushed
//! here by the revoke telemetry loop; gauges are set on the same tick.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use metrics_process::Collector;
use once_cell::sync::OnceCell;

use crate::revoke::counters::Snapshot;

// Metric name constants
pub const REVOKES_TOTAL: &str = "revokes_total";
pub const REVOKE_EVICTED_TOTAL: &str = "revoke_evicted_total";
pub const REVOKE_ADMITTED_TOTAL: &str = "revoke_admitted_total";
pub const REVOKE_STALE_REJECTED_TOTAL: &str = "revoke_stale_rejected_total";
pub const REVOKE_SWEEPS_TOTAL: &str = "revoke_sweeps_total";
pub const REVOKE_SWEEP_FAILURES_TOTAL: &str = "revoke_sweep_failures_total";
pub const REVOKE_INDEX_REMOVED_TOTAL: &str = "revoke_index_removed_total";

pub const REVOKE_QUEUE_PENDING: &str = "revoke_queue_pending";
pub const REVOKE_INDEX_SIZE: &str = "revoke_index_size";

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
static PROC_COLLECTOR: OnceCell<Collector> = OnceCell::new();

/// Installs the global Prometheus recorder and the process metrics collector.
/// `install_recorder` does not spawn an exporter, rendering goes through [`render`].
pub fn init_prometheus_exporter() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;
    PROM_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("Prometheus handle already initialized"))?;

    describe();

    let collector = Collector::default();
    collector.describe();
    let _ = PROC_COLLECTOR.set(collector);
    Ok(())
}

fn describe() {
    metrics::describe_counter!(REVOKES_TOTAL, "Revoke events recorded");
    metrics::describe_counter!(REVOKE_EVICTED_TOTAL, "Cache keys evicted by revokes");
    metrics::describe_counter!(REVOKE_ADMITTED_TOTAL, "Populations admitted into the cache");
    metrics::describe_counter!(
        REVOKE_STALE_REJECTED_TOTAL,
        "Populations rejected because a revoke landed during compute"
    );
    metrics::describe_counter!(REVOKE_SWEEPS_TOTAL, "Completed revoke queue sweeps");
    metrics::describe_counter!(REVOKE_SWEEP_FAILURES_TOTAL, "Failed or panicked sweeps");
    metrics::describe_counter!(REVOKE_INDEX_REMOVED_TOTAL, "Reverse index entries removed by sweeps");
    metrics::describe_gauge!(REVOKE_QUEUE_PENDING, "Revokes waiting for cleanup");
    metrics::describe_gauge!(REVOKE_INDEX_SIZE, "Revoke keys tracked by the reverse index");
}

/// Renders the current metrics in Prometheus text format, if the exporter is installed.
pub fn render() -> Option<String> {
    let handle = PROM_HANDLE.get()?;
    if let Some(collector) = PROC_COLLECTOR.get() {
        collector.collect();
    }
    handle.run_upkeep();
    Some(handle.render())
}

/// Adds revoke statistics accumulated since the previous flush.
pub fn add_revoke_stat_counters(stats: &Snapshot) {
    metrics::counter!(REVOKES_TOTAL).increment(stats.revokes.max(0) as u64);
    metrics::counter!(REVOKE_EVICTED_TOTAL).increment(stats.evicted.max(0) as u64);
    metrics::counter!(REVOKE_ADMITTED_TOTAL).increment(stats.admitted.max(0) as u64);
    metrics::counter!(REVOKE_STALE_REJECTED_TOTAL, "phase" => "before_register")
        .increment(stats.stale_before_register.max(0) as u64);
    metrics::counter!(REVOKE_STALE_REJECTED_TOTAL, "phase" => "after_register")
        .increment(stats.stale_after_register.max(0) as u64);
    metrics::counter!(REVOKE_SWEEPS_TOTAL).increment(stats.sweeps.max(0) as u64);
    metrics::counter!(REVOKE_SWEEP_FAILURES_TOTAL).increment(stats.sweep_failures.max(0) as u64);
    metrics::counter!(REVOKE_INDEX_REMOVED_TOTAL).increment(stats.index_removed.max(0) as u64);
}

/// Sets the number of revokes waiting for cleanup.
pub fn set_revoke_queue_pending(count: u64) {
    metrics::gauge!(REVOKE_QUEUE_PENDING).set(count as f64);
}

/// Sets the number of revoke keys tracked by the reverse index.
pub fn set_revoke_index_size(count: u64) {
    metrics::gauge!(REVOKE_INDEX_SIZE).set(count as f64);
}
