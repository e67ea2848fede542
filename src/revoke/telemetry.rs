// Package revoke provides telemetry for revoke processing.

use std::sync::Arc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::config::RevokeSettings;
use crate::metrics;

use super::counters::Counters;
use super::maintainer::RevokeQueueMaintainer;
use super::reverse_index::ReverseIndex;

const COMPONENT: &str = "revoke-telemetry";

/// Periodically flushes revoke counters to metrics and logs a stats line.
/// The flush interval is re-read from settings after every tick.
pub async fn logger(
    shutdown_token: CancellationToken,
    counters: Arc<Counters>,
    index: Arc<ReverseIndex>,
    maintainer: Arc<RevokeQueueMaintainer>,
    settings: RevokeSettings,
) {
    let mut each = settings.load().telemetry_interval();
    let mut ticker = interval(each);

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                tracing::debug!(component = COMPONENT, event = "stopped", "revoke logger stopped");
                return;
            }
            _ = ticker.tick() => {
                let stats = counters.reset();
                let pending = maintainer.queue_len();
                let index_size = index.len();

                metrics::add_revoke_stat_counters(&stats);
                metrics::set_revoke_queue_pending(pending as u64);
                metrics::set_revoke_index_size(index_size as u64);

                if stats.revokes > 0 || stats.stale_total() > 0 || stats.sweep_failures > 0 || pending > 0 {
                    tracing::info!(
                        component = COMPONENT,
                        event = "stats",
                        revokes = stats.revokes,
                        evicted = stats.evicted,
                        admitted = stats.admitted,
                        stale_before_register = stats.stale_before_register,
                        stale_after_register = stats.stale_after_register,
                        sweeps = stats.sweeps,
                        sweep_failures = stats.sweep_failures,
                        index_removed = stats.index_removed,
                        index_size,
                        pending,
                        "revoke stats"
                    );
                }

                let next = settings.load().telemetry_interval();
                if next != each {
                    each = next;
                    ticker = interval(each);
                    ticker.reset();
                }
            }
        }
    }
}
