// Error definitions for revoke maintenance

/// Errors surfaced by [`super::RevokeQueueMaintainer::maintain`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaintainError {
    /// The maintainer was disposed and no longer services its queue.
    #[error("revoke queue maintainer is disposed")]
    Disposed,
    /// `now - older_than` does not fit the timestamp range.
    #[error("revoke cleanup cutoff is out of range (older_than = {older_than_ms}ms)")]
    CutoffOutOfRange { older_than_ms: u128 },
}
