// Package revoke provides the revoke queue maintainer.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::RevokeSettings;
use crate::time::{self, Clock, Timestamp};

use super::counters::Counters;
use super::error::MaintainError;
use super::reverse_index::{ReverseIndex, RevokeKey};

const COMPONENT: &str = "revoke-maintainer";

/// Pending revoke, queued for a later cleanup attempt of its index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeQueueItem {
    pub revoke_key: RevokeKey,
    pub enqueued_at: Timestamp,
}

/// RevokeQueueMaintainer owns the FIFO of pending revokes and the background
/// sweep that removes empty, sufficiently old reverse index entries.
///
/// The sweep loop sleeps only after a sweep completes, so two sweeps never
/// overlap even when one overruns the interval. The interval is read from the
/// shared settings on every iteration.
pub struct RevokeQueueMaintainer {
    index: Arc<ReverseIndex>,
    settings: RevokeSettings,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
    queue: Mutex<VecDeque<RevokeQueueItem>>,
    started: AtomicBool,
    disposed: AtomicBool,
    token: CancellationToken,
}

impl RevokeQueueMaintainer {
    /// Creates a maintainer. Nothing runs until [`Self::start`] is called.
    ///
    /// `shutdown_token` cancels the sweep loop together with the rest of the app;
    /// [`Self::dispose`] cancels only this maintainer.
    pub fn new(
        shutdown_token: &CancellationToken,
        index: Arc<ReverseIndex>,
        settings: RevokeSettings,
        clock: Arc<dyn Clock>,
        counters: Arc<Counters>,
    ) -> Arc<Self> {
        Arc::new(Self {
            index,
            settings,
            clock,
            counters,
            queue: Mutex::new(VecDeque::new()),
            started: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            token: shutdown_token.child_token(),
        })
    }

    /// Number of revokes waiting for cleanup.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// True while the sweep loop is scheduled.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.is_disposed() && !self.token.is_cancelled()
    }

    /// Appends a revoke at the tail of the queue.
    pub fn enqueue(&self, revoke_key: &str, now: Timestamp) {
        self.queue.lock().push_back(RevokeQueueItem {
            revoke_key: revoke_key.to_string(),
            enqueued_at: now,
        });
    }

    /// Drains every queued revoke older than `now - older_than` and tries to drop
    /// its index entry. Stops at the first younger item: the queue is FIFO, so
    /// everything behind it is younger too.
    ///
    /// Returns the number of queue items drained.
    pub fn maintain(&self, older_than: Duration) -> Result<usize, MaintainError> {
        if self.is_disposed() {
            return Err(MaintainError::Disposed);
        }

        let cutoff = time::checked_sub(self.clock.now(), older_than).ok_or(
            MaintainError::CutoffOutOfRange {
                older_than_ms: older_than.as_millis(),
            },
        )?;

        let mut drained = 0;
        let mut removed = 0;
        loop {
            let item = {
                let mut queue = self.queue.lock();
                match queue.front() {
                    Some(head) if head.enqueued_at <= cutoff => queue.pop_front(),
                    _ => None,
                }
            };
            let Some(item) = item else {
                break;
            };
            drained += 1;

            // Non-empty, already gone, or revoked again since: just drop the item.
            if self.index.try_remove_if_empty(&item.revoke_key, cutoff) {
                removed += 1;
            }
        }

        Counters::inc(&self.counters.index_removed, removed);
        Ok(drained)
    }

    /// Starts the self-pacing sweep loop. The first sweep runs immediately.
    /// Calling it twice, or after disposal, does nothing.
    pub fn start(self: &Arc<Self>) {
        if self.is_disposed() || self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        let maintainer = Arc::clone(self);
        tokio::task::spawn(async move {
            maintainer.run().await;
        });
    }

    async fn run(&self) {
        info!(
            component = COMPONENT,
            event = "started",
            interval = %humantime::format_duration(self.settings.load().cleanup_interval()),
            "revoke maintainer started"
        );
        loop {
            let interval = self.settings.load().cleanup_interval();
            self.sweep(interval);

            tokio::select! {
                _ = self.token.cancelled() => {
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!(component = COMPONENT, event = "stopped", "revoke maintainer stopped");
    }

    /// One guarded sweep. Failures are reported and swallowed so the loop
    /// always schedules the next one.
    fn sweep(&self, older_than: Duration) {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.maintain(older_than)));

        match outcome {
            Ok(Ok(drained)) => {
                Counters::inc(&self.counters.sweeps, 1);
                if drained > 0 {
                    debug!(
                        component = COMPONENT,
                        event = "swept",
                        drained,
                        pending = self.queue_len(),
                        took_us = started.elapsed().as_micros() as u64,
                        "revoke queue swept"
                    );
                }
            }
            Ok(Err(MaintainError::Disposed)) => {}
            Ok(Err(e)) => {
                Counters::inc(&self.counters.sweep_failures, 1);
                error!(
                    component = COMPONENT,
                    event = "programmatic_error",
                    error = %e,
                    "revoke sweep failed"
                );
            }
            Err(panic) => {
                Counters::inc(&self.counters.sweep_failures, 1);
                error!(
                    component = COMPONENT,
                    event = "programmatic_error",
                    panic = %panic_message(panic.as_ref()),
                    "revoke sweep panicked"
                );
            }
        }
    }

    /// Stops scheduling sweeps. A sweep already running finishes; idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.token.cancel();
        info!(
            component = COMPONENT,
            event = "disposed",
            pending = self.queue_len(),
            "revoke maintainer disposed"
        );
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
