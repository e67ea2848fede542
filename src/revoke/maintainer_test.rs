#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use crate::config::{self, Revoke};
    use crate::revoke::{Counters, MaintainError, ReverseIndex, RevokeQueueMaintainer};
    use crate::time::{from_unix_millis, Clock, ManualClock, Timestamp};

    struct Fixture {
        index: Arc<ReverseIndex>,
        clock: Arc<ManualClock>,
        counters: Arc<Counters>,
        maintainer: Arc<RevokeQueueMaintainer>,
        shutdown: CancellationToken,
    }

    fn fixture_with_clock(
        cleanup_ms: u64,
        clock: Arc<dyn Clock>,
        manual: Arc<ManualClock>,
    ) -> Fixture {
        let index = Arc::new(ReverseIndex::new());
        let counters = Arc::new(Counters::new());
        let settings = config::new_test_config().revoke_settings();
        settings.store(Arc::new(Revoke {
            revokes_cleanup_ms: cleanup_ms,
            telemetry_interval: None,
        }));
        let shutdown = CancellationToken::new();
        let maintainer = RevokeQueueMaintainer::new(
            &shutdown,
            index.clone(),
            settings,
            clock,
            counters.clone(),
        );
        Fixture {
            index,
            clock: manual,
            counters,
            maintainer,
            shutdown,
        }
    }

    fn fixture(cleanup_ms: u64) -> Fixture {
        let clock = Arc::new(ManualClock::new(from_unix_millis(0)));
        fixture_with_clock(cleanup_ms, clock.clone(), clock)
    }

    fn secs(s: i64) -> Timestamp {
        from_unix_millis(s * 1_000)
    }

    /// Records a revoke in the index and queues it, like the coordinator does.
    fn revoke(f: &Fixture, key: &str, at: Timestamp) {
        f.index.record_revoke(key, at);
        f.maintainer.enqueue(key, at);
    }

    #[test]
    fn test_old_empty_entry_is_removed() {
        let f = fixture(1_000);
        revoke(&f, "r1", secs(0));

        f.clock.set(secs(10));
        assert_eq!(f.maintainer.maintain(Duration::from_secs(5)), Ok(1));

        assert!(f.index.is_empty());
        assert_eq!(f.maintainer.queue_len(), 0);
        assert_eq!(f.counters.snapshot().index_removed, 1);
    }

    #[test]
    fn test_distinct_never_cached_revokes_are_bounded() {
        let f = fixture(1_000);
        for i in 0..1_000 {
            revoke(&f, &format!("r{i}"), secs(0));
        }
        assert_eq!(f.index.len(), 1_000);
        assert_eq!(f.maintainer.queue_len(), 1_000);

        f.clock.set(secs(2));
        assert_eq!(f.maintainer.maintain(Duration::from_secs(1)), Ok(1_000));
        assert_eq!(f.index.len(), 0);
        assert_eq!(f.maintainer.queue_len(), 0);
    }

    #[test]
    fn test_sweep_stops_at_first_young_item() {
        let f = fixture(1_000);
        revoke(&f, "young", secs(10));
        // Older than the cutoff, but behind a younger head.
        revoke(&f, "old", secs(0));

        f.clock.set(secs(12));
        assert_eq!(f.maintainer.maintain(Duration::from_secs(5)), Ok(0));
        assert_eq!(f.index.len(), 2);
        assert_eq!(f.maintainer.queue_len(), 2);
    }

    #[test]
    fn test_entry_with_dependents_survives_and_item_is_dropped() {
        let f = fixture(1_000);
        revoke(&f, "r1", secs(0));
        f.index.register("c1", &["r1".to_string()]);

        f.clock.set(secs(10));
        assert_eq!(f.maintainer.maintain(Duration::from_secs(5)), Ok(1));
        assert_eq!(f.index.dependents("r1"), vec!["c1".to_string()]);
        assert_eq!(f.maintainer.queue_len(), 0);
    }

    #[test]
    fn test_rerevoked_entry_waits_for_its_latest_item() {
        let f = fixture(1_000);
        revoke(&f, "r1", secs(0));
        revoke(&f, "r1", secs(9));

        f.clock.set(secs(10));
        assert_eq!(f.maintainer.maintain(Duration::from_secs(5)), Ok(1));
        assert_eq!(f.index.len(), 1, "revoked after the cutoff");
        assert_eq!(f.maintainer.queue_len(), 1);

        f.clock.set(secs(20));
        assert_eq!(f.maintainer.maintain(Duration::from_secs(5)), Ok(1));
        assert!(f.index.is_empty());
    }

    #[test]
    fn test_cutoff_underflow_is_reported() {
        let f = fixture(1_000);
        f.clock.set(crate::time::NEVER);
        assert!(matches!(
            f.maintainer.maintain(Duration::from_secs(1)),
            Err(MaintainError::CutoffOutOfRange { .. })
        ));
    }

    #[test]
    fn test_dispose_is_idempotent_and_stops_servicing() {
        let f = fixture(1_000);
        revoke(&f, "r1", secs(0));

        f.maintainer.dispose();
        f.maintainer.dispose();

        assert!(f.maintainer.is_disposed());
        assert!(!f.maintainer.is_running());
        assert_eq!(
            f.maintainer.maintain(Duration::from_secs(0)),
            Err(MaintainError::Disposed)
        );
        // Enqueue stays best-effort after disposal.
        f.maintainer.enqueue("r2", secs(1));
        assert_eq!(f.maintainer.queue_len(), 2);
    }

    #[tokio::test]
    async fn test_background_sweep_cleans_index() {
        let f = fixture(10);
        f.maintainer.start();
        assert!(f.maintainer.is_running());

        revoke(&f, "r1", secs(0));
        f.clock.set(secs(60));

        tokio::time::timeout(Duration::from_secs(5), async {
            while !f.index.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("sweep never removed the entry");

        assert!(f.counters.snapshot().sweeps > 0);
        f.maintainer.dispose();
    }

    #[tokio::test]
    async fn test_start_after_dispose_does_not_schedule() {
        let f = fixture(10);
        f.maintainer.dispose();
        f.maintainer.start();
        assert!(!f.maintainer.is_running());

        revoke(&f, "r1", secs(0));
        f.clock.set(secs(60));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.index.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_loop() {
        let f = fixture(10);
        f.maintainer.start();
        f.shutdown.cancel();
        assert!(!f.maintainer.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queue_len_stays_within_enqueued_during_concurrent_sweeps() {
        const PER_WORKER: usize = 2_000;
        const WORKERS: usize = 4;
        let f = Arc::new(fixture(1_000));
        f.clock.set(secs(10));

        let mut handles = Vec::new();
        for worker in 0..WORKERS {
            let f = f.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..PER_WORKER {
                    f.maintainer.enqueue(&format!("r{worker}-{i}"), secs(0));
                    if i % 64 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        let sweeper = {
            let f = f.clone();
            tokio::spawn(async move {
                let mut drained = 0;
                while drained < PER_WORKER * WORKERS {
                    drained += f.maintainer.maintain(Duration::ZERO).unwrap();
                    assert!(f.maintainer.queue_len() <= PER_WORKER * WORKERS);
                    tokio::task::yield_now().await;
                }
            })
        };
        for handle in handles {
            handle.await.unwrap();
        }
        sweeper.await.unwrap();

        assert_eq!(f.maintainer.queue_len(), 0);
    }

    /// Clock whose first readings panic, standing in for a sweep that blows up.
    struct FlakyClock {
        failures_left: AtomicUsize,
        inner: Arc<ManualClock>,
    }

    impl Clock for FlakyClock {
        fn now(&self) -> Timestamp {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                panic!("clock source unavailable");
            }
            self.inner.now()
        }
    }

    #[tokio::test]
    async fn test_panicking_sweep_does_not_stop_future_sweeps() {
        let manual = Arc::new(ManualClock::new(secs(60)));
        let flaky = Arc::new(FlakyClock {
            failures_left: AtomicUsize::new(2),
            inner: manual.clone(),
        });
        let f = fixture_with_clock(10, flaky, manual);

        f.index.record_revoke("r1", secs(0));
        f.maintainer.enqueue("r1", secs(0));
        f.maintainer.start();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !f.index.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("sweeps stopped after a panic");

        assert_eq!(f.counters.snapshot().sweep_failures, 2);
        f.maintainer.dispose();
    }
}
