// Integration tests for the reverse index staying bounded under revoke churn.

use bytes::Bytes;

use crate::channel::RevokeChannel;
use crate::revoke::Populated;
use crate::store::CacheStore;
use crate::tests::support::{eventually, TestApp};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_never_cached_revokes_do_not_accumulate() {
    let test_app = TestApp::started();
    let coordinator = test_app.app.coordinator().clone();

    // Evicted by the last revoke: once it is gone, every earlier one was delivered.
    coordinator
        .get_or_populate("sentinel", || async {
            Ok(Populated::new(Bytes::from_static(b"s"), vec!["sentinel".to_string()]))
        })
        .await
        .unwrap();

    for i in 0..500 {
        test_app.app.channel().publish(&format!("ghost:{i}")).unwrap();
    }
    test_app.app.channel().publish("sentinel").unwrap();

    eventually("all revokes delivered", || {
        let coordinator = coordinator.clone();
        async move { coordinator.store().is_empty() }
    })
    .await;

    eventually("index drained by sweeps", || {
        let coordinator = coordinator.clone();
        async move { coordinator.index().is_empty() && coordinator.maintainer().queue_len() == 0 }
    })
    .await;

    test_app.stop().await;
}
