// Package liveness provides Kubernetes liveness probe functionality.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const MIN_TIMEOUT: Duration = Duration::from_millis(1);
const FALLBACK_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, thiserror::Error)]
#[error("liveness probe timeout is too short")]
pub struct TimeoutIsTooShortError;

/// Service interface for liveness checking.
pub trait Service: Send + Sync {
    /// Checks if the service is alive.
    fn is_alive(&self, timeout: Duration) -> bool;
}

/// Liveness probe over a set of watched services. Alive while all of them are.
pub struct Probe {
    services: RwLock<Vec<Arc<dyn Service>>>,
    timeout: Duration,
}

impl Probe {
    pub fn new(timeout: Duration) -> Self {
        let timeout = if timeout < MIN_TIMEOUT {
            warn!(
                component = "liveness",
                error = %TimeoutIsTooShortError,
                "min timeout duration is 1ms, using 10ms"
            );
            FALLBACK_TIMEOUT
        } else {
            timeout
        };

        Self {
            services: RwLock::new(Vec::new()),
            timeout,
        }
    }

    /// Adds services to the watched set.
    pub fn watch(&self, services: Vec<Arc<dyn Service>>) {
        self.services.write().extend(services);
    }

    /// True when every watched service reports alive. An empty probe is alive.
    pub fn is_alive(&self) -> bool {
        self.services
            .read()
            .iter()
            .all(|service| service.is_alive(self.timeout))
    }
}
