// Configuration loading and management.

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub mod watcher;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
pub const TEST: &str = "test";

/// Default retention window and sweep interval of the revoke maintainer.
pub const DEFAULT_REVOKES_CLEANUP_MS: u64 = 1_000;
const DEFAULT_TELEMETRY_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Revcache {
    #[serde(rename = "revcache")]
    pub revcache: RevcacheBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RevcacheBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub api: Option<Api>,
    pub revoke: Option<Revoke>,
    pub store: Option<Store>,
    pub reload: Option<Reload>,
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    pub name: Option<String>,
    pub port: Option<String>,
}

/// Revoke maintenance settings. Hot-reloadable, see [`RevokeSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Revoke {
    /// Sweep interval and retention window of revoked, empty index entries.
    #[serde(rename = "revokes_cleanup_ms")]
    pub revokes_cleanup_ms: u64,
    /// How often revoke counters are flushed to logs and metrics.
    #[serde(rename = "telemetry_interval", default, with = "humantime_serde")]
    pub telemetry_interval: Option<Duration>,
}

impl Revoke {
    /// Sweep interval, never zero.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.revokes_cleanup_ms.max(1))
    }

    pub fn telemetry_interval(&self) -> Duration {
        self.telemetry_interval.unwrap_or(DEFAULT_TELEMETRY_INTERVAL)
    }
}

impl Default for Revoke {
    fn default() -> Self {
        Self {
            revokes_cleanup_ms: DEFAULT_REVOKES_CLEANUP_MS,
            telemetry_interval: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Store {
    /// Entries older than this are recomputed. Unset keeps entries until revoked.
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Reload {
    pub enabled: bool,
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metrics {
    pub enabled: bool,
}

/// Shared, swappable revoke settings. Readers `load()` on every use,
/// the config watcher `store()`s a new value when the file changes.
pub type RevokeSettings = Arc<ArcSwap<Revoke>>;

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn api(&self) -> Option<&Api>;
    fn revoke(&self) -> Revoke;
    fn store_ttl(&self) -> Option<Duration>;
    fn reload(&self) -> Option<&Reload>;
    fn is_metrics_enabled(&self) -> bool;
}

// Config type alias for convenience
pub type Config = Revcache;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.revcache.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.revcache.env == PROD
    }

    fn is_test(&self) -> bool {
        self.revcache.env == TEST
    }

    fn api(&self) -> Option<&Api> {
        self.revcache.api.as_ref()
    }

    fn revoke(&self) -> Revoke {
        self.revcache.revoke.clone().unwrap_or_default()
    }

    fn store_ttl(&self) -> Option<Duration> {
        self.revcache.store.as_ref().and_then(|s| s.ttl)
    }

    fn reload(&self) -> Option<&Reload> {
        self.revcache.reload.as_ref()
    }

    fn is_metrics_enabled(&self) -> bool {
        self.revcache.metrics.as_ref().is_some_and(|m| m.enabled)
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::parse(&data).with_context(|| format!("unmarshal yaml from {:?}", abs_path))
    }

    /// Parses and validates configuration from YAML text.
    pub fn parse(data: &str) -> Result<Self> {
        let cfg: Revcache = serde_yaml::from_str(data)?;

        if let Some(ref revoke) = cfg.revcache.revoke {
            if revoke.revokes_cleanup_ms == 0 {
                anyhow::bail!("revoke.revokes_cleanup_ms must be positive");
            }
        }

        Ok(cfg)
    }

    /// Builds the hot-reloadable settings handle seeded from this config.
    pub fn revoke_settings(&self) -> RevokeSettings {
        Arc::new(ArcSwap::from_pointee(self.revoke()))
    }

    /// Interval at which the watcher re-reads the config file, if reloading is on.
    pub fn reload_interval(&self) -> Option<Duration> {
        self.reload()
            .filter(|r| r.enabled)
            .map(|r| r.interval.unwrap_or(DEFAULT_RELOAD_INTERVAL))
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;
