// Integration test harness setup.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::config::{self, Config};
use crate::shutdown::GracefulShutdown;

const EVENTUALLY_TIMEOUT: Duration = Duration::from_secs(5);
const EVENTUALLY_STEP: Duration = Duration::from_millis(10);

/// An application instance with its own shutdown token.
pub struct TestApp {
    pub app: App,
    pub gsh: GracefulShutdown,
}

impl TestApp {
    /// Builds the app on the test config without starting anything.
    pub fn new() -> Self {
        Self::with_config(config::new_test_config(), None)
    }

    pub fn with_config(cfg: Config, cfg_path: Option<PathBuf>) -> Self {
        let token = CancellationToken::new();
        let app = App::new(token.clone(), cfg, cfg_path);
        let gsh = GracefulShutdown::new(token.clone()).with_timeout(Duration::from_secs(5));
        Self { app, gsh }
    }

    /// Builds and starts the background subsystem (no socket is bound).
    pub fn started() -> Self {
        let test_app = Self::new();
        test_app.app.start(&test_app.gsh);
        test_app
    }

    /// Closes the app and waits for its background tasks.
    pub async fn stop(self) {
        self.app.close();
        self.gsh
            .await_shutdown()
            .await
            .expect("background tasks did not stop");
    }
}

/// Polls `check` until it returns true, panicking with `what` on timeout.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(EVENTUALLY_TIMEOUT, async {
        while !check().await {
            tokio::time::sleep(EVENTUALLY_STEP).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for: {what}");
}
