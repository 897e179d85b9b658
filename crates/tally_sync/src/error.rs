//! Error types for the sync engine.

use tally_remote::RemoteError;
use tally_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can interrupt a sync phase.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Remote call failure, already classified by the remote client.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl SyncError {
    /// Returns true if retrying the phase may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(error) => error.is_retryable(),
            SyncError::Store(_) => false,
        }
    }

    /// Returns true for permanent remote rejections, where isolating
    /// individual rows is worthwhile.
    pub fn is_permanent_remote(&self) -> bool {
        matches!(
            self,
            SyncError::Remote(RemoteError::Permanent { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_follows_remote_classification() {
        let err: SyncError = RemoteError::Transient {
            message: "timeout".into(),
        }
        .into();
        assert!(err.is_retryable());

        let err: SyncError = RemoteError::Auth {
            message: "rejected".into(),
        }
        .into();
        assert!(!err.is_retryable());
        assert!(!err.is_permanent_remote());

        let err: SyncError = RemoteError::Permanent {
            message: "bad row".into(),
            constraint: false,
        }
        .into();
        assert!(err.is_permanent_remote());
    }
}
