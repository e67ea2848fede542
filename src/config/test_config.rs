use super::{Config, RevcacheBox};
use std::time::Duration;

/// Creates a new test configuration.
pub fn new_test_config() -> Config {
    Config {
        revcache: RevcacheBox {
            env: super::TEST.to_string(),
            logs: Some(super::Logs {
                level: Some("debug".to_string()),
            }),
            api: Some(super::Api {
                name: Some("revcache:8021".to_string()),
                port: Some("8021".to_string()),
            }),
            revoke: Some(super::Revoke {
                revokes_cleanup_ms: 50,
                telemetry_interval: Some(Duration::from_millis(100)),
            }),
            store: None,
            reload: Some(super::Reload {
                enabled: false,
                interval: Some(Duration::from_millis(50)),
            }),
            metrics: Some(super::Metrics { enabled: false }),
        },
    }
}
