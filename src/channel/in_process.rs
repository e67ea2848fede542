// Package channel provides the in-process revoke channel.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::{ChannelError, RevokeChannel, RevokeSubscription};
use crate::revoke::RevokeKey;

/// Fans every revoke out to each subscriber's own unbounded queue, so a
/// subscriber that falls behind buffers instead of dropping revokes.
/// Clones share the subscriber list.
#[derive(Clone, Default)]
pub struct BroadcastRevokeChannel {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<RevokeKey>>>>,
}

impl BroadcastRevokeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.len()
    }
}

impl std::fmt::Debug for BroadcastRevokeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastRevokeChannel")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl RevokeChannel for BroadcastRevokeChannel {
    fn publish(&self, revoke_key: &str) -> Result<usize, ChannelError> {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|sender| sender.send(revoke_key.to_string()).is_ok());

        if before != subscribers.len() {
            debug!(
                component = "revoke-channel",
                event = "unsubscribed",
                dropped = before - subscribers.len(),
                "closed subscriptions removed"
            );
        }

        match subscribers.len() {
            0 => Err(ChannelError::Closed),
            reached => Ok(reached),
        }
    }

    fn subscribe(&self) -> RevokeSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().push(sender);
        RevokeSubscription::new(receiver)
    }
}
