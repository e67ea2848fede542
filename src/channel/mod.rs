// Package channel provides revoke event delivery between nodes.
//
// Delivery is at-least-once and unordered across keys. A slow receiver never
// loses revokes: each subscription buffers its own backlog.

pub mod in_process;
pub mod listener;


use tokio::sync::mpsc;

use crate::revoke::RevokeKey;

pub use in_process::BroadcastRevokeChannel;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Nobody is subscribed, the revoke went nowhere.
    #[error("revoke channel closed: no subscribers")]
    Closed,
}

/// Publish/subscribe transport for revoke keys.
pub trait RevokeChannel: Send + Sync {
    /// Publishes `revoke_key`. Returns the number of subscribers it reached.
    fn publish(&self, revoke_key: &str) -> Result<usize, ChannelError>;

    /// Subscribes to revokes published from now on.
    fn subscribe(&self) -> RevokeSubscription;
}

/// Receiving end of a [`RevokeChannel`].
pub struct RevokeSubscription {
    receiver: mpsc::UnboundedReceiver<RevokeKey>,
}

impl RevokeSubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<RevokeKey>) -> Self {
        Self { receiver }
    }

    /// Waits for the next revoke key. `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<RevokeKey> {
        self.receiver.recv().await
    }

    /// Revokes delivered to this subscription and not received yet.
    pub fn backlog(&self) -> usize {
        self.receiver.len()
    }
}
