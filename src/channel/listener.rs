// Package channel provides the task feeding delivered revokes into the coordinator.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::RevokeSubscription;
use crate::revoke::RevokeHandler;

const COMPONENT: &str = "revoke-listener";

/// Forwards every delivered revoke key to `handler` until the token is
/// cancelled or the channel closes. Receipt time is taken by the handler.
pub async fn serve(
    handler: Arc<dyn RevokeHandler>,
    mut subscription: RevokeSubscription,
    shutdown_token: CancellationToken,
) {
    info!(component = COMPONENT, event = "started", "revoke listener started");
    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                break;
            }
            key = subscription.recv() => {
                let Some(key) = key else {
                    break;
                };
                let dependents = handler.record_revoke(&key);
                debug!(
                    component = COMPONENT,
                    event = "delivered",
                    revoke_key = %key,
                    dependents,
                    "revoke delivered"
                );
            }
        }
    }
    info!(component = COMPONENT, event = "stopped", "revoke listener stopped");
}
