// Periodic config file watcher for hot-reloadable settings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Config, ConfigTrait, RevokeSettings};

/// Re-reads `path` every `each` and swaps the revoke settings when they differ.
/// A file that fails to load keeps the previous settings in place.
pub async fn watch(
    shutdown_token: CancellationToken,
    path: PathBuf,
    settings: RevokeSettings,
    each: Duration,
) {
    let mut ticker = tokio::time::interval(each);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately, the file was just loaded.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                return;
            }
            _ = ticker.tick() => {
                reload_once(&path, &settings);
            }
        }
    }
}

/// Applies the revoke section of `path` to `settings`. Returns true if it changed.
pub fn reload_once(path: &Path, settings: &RevokeSettings) -> bool {
    let cfg = match Config::load(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                component = "config",
                event = "reload_failed",
                path = ?path,
                error = %e,
                "config reload failed, keeping previous settings"
            );
            return false;
        }
    };

    let next = cfg.revoke();
    if **settings.load() == next {
        return false;
    }

    info!(
        component = "config",
        event = "reloaded",
        path = ?path,
        revokes_cleanup_ms = next.revokes_cleanup_ms,
        "revoke settings reloaded"
    );
    settings.store(Arc::new(next));
    true
}
