//! Classified remote errors.

use std::time::Duration;
use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors surfaced by the remote client.
///
/// The classification is assigned once, at the transport boundary, from
/// the structural failure signal (status code, timeout, socket error).
/// Callers match on the variant, never on message text.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// No remote endpoint is configured.
    #[error("remote store is not configured")]
    NotConfigured,

    /// The connectivity probe reports the device offline; no network
    /// attempt was made.
    #[error("device is offline")]
    Offline,

    /// The circuit breaker is open after recent failures.
    #[error("remote temporarily unavailable, retry in {retry_in:?}")]
    CircuitOpen {
        /// Time until the circuit closes again.
        retry_in: Duration,
    },

    /// Credentials were rejected. Never retried; callers re-authenticate
    /// out-of-band.
    #[error("authentication rejected: {message}")]
    Auth {
        /// Server-provided detail.
        message: String,
    },

    /// Timeout, connection failure, or server-side 5xx. Retried with
    /// backoff.
    #[error("transient remote failure: {message}")]
    Transient {
        /// Failure detail.
        message: String,
    },

    /// Validation or constraint failure. Not retried.
    #[error("permanent remote failure: {message}")]
    Permanent {
        /// Failure detail.
        message: String,
        /// True for unique-constraint violations, which callers treat as
        /// idempotent no-ops.
        constraint: bool,
    },
}

impl RemoteError {
    /// Returns true if a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Transient { .. })
    }

    /// Returns true for unique-constraint violations.
    pub fn is_constraint(&self) -> bool {
        matches!(
            self,
            RemoteError::Permanent {
                constraint: true,
                ..
            }
        )
    }
}
