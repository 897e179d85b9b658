//! Transport abstraction for statement execution.
//!
//! [`StatementExecutor`] is the seam between the remote client and the
//! network. The production implementation posts JSON over HTTP via
//! reqwest; tests substitute an in-process fake.

use crate::wire::{QueryResponse, StatementBatch};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The raw, unclassified failure signal from one transport attempt.
///
/// Classification into a [`crate::RemoteError`] happens once, in the
/// remote client; the transport only reports what structurally happened.
#[derive(Debug, Clone, Error)]
pub enum TransportFailure {
    /// The request exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// Socket, DNS, or TLS level failure before a response arrived.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server answered with a non-success HTTP status.
    #[error("HTTP {code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Executes statement batches against the remote store.
pub trait StatementExecutor: Send + Sync {
    /// Executes one batch under the given deadline.
    fn execute(
        &self,
        batch: StatementBatch,
        timeout: Duration,
    ) -> impl Future<Output = Result<QueryResponse, TransportFailure>> + Send;
}

impl<E: StatementExecutor> StatementExecutor for std::sync::Arc<E> {
    fn execute(
        &self,
        batch: StatementBatch,
        timeout: Duration,
    ) -> impl Future<Output = Result<QueryResponse, TransportFailure>> + Send {
        E::execute(self, batch, timeout)
    }
}

/// HTTP transport: posts the batch as JSON to the configured endpoint.
pub struct HttpStatementExecutor {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpStatementExecutor {
    /// Creates an executor for the given endpoint.
    pub fn new(
        endpoint: impl Into<String>,
        auth_token: Option<String>,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            endpoint: endpoint.into(),
            auth_token,
        })
    }

    /// The configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl StatementExecutor for HttpStatementExecutor {
    fn execute(
        &self,
        batch: StatementBatch,
        timeout: Duration,
    ) -> impl Future<Output = Result<QueryResponse, TransportFailure>> + Send {
        async move {
            let mut request = self
                .client
                .post(&self.endpoint)
                .json(&batch)
                .timeout(timeout)
                .header("Accept", "application/json");
            if let Some(token) = &self.auth_token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    TransportFailure::Timeout
                } else {
                    TransportFailure::Connect(e.to_string())
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportFailure::Status {
                    code: status.as_u16(),
                    body,
                });
            }

            response.json::<QueryResponse>().await.map_err(|e| {
                if e.is_timeout() {
                    TransportFailure::Timeout
                } else {
                    TransportFailure::Decode(e.to_string())
                }
            })
        }
    }
}

/// An executor fed from a scripted response queue, for tests.
#[derive(Default)]
pub struct MockExecutor {
    responses: Mutex<VecDeque<Result<QueryResponse, TransportFailure>>>,
    calls: Mutex<Vec<StatementBatch>>,
}

impl MockExecutor {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the next response.
    pub fn push_response(&self, response: Result<QueryResponse, TransportFailure>) {
        self.responses.lock().push_back(response);
    }

    /// Number of executed calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Copies of the batches executed so far.
    pub fn calls(&self) -> Vec<StatementBatch> {
        self.calls.lock().clone()
    }
}

impl StatementExecutor for MockExecutor {
    fn execute(
        &self,
        batch: StatementBatch,
        _timeout: Duration,
    ) -> impl Future<Output = Result<QueryResponse, TransportFailure>> + Send {
        self.calls.lock().push(batch);
        let result = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportFailure::Connect("no mock response queued".into())));
        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Statement, StatementResult};

    fn batch() -> StatementBatch {
        StatementBatch::single(Statement::new("SELECT 1", vec![]))
    }

    #[tokio::test]
    async fn mock_replays_queued_responses() {
        let mock = MockExecutor::new();
        mock.push_response(Ok(QueryResponse::single(StatementResult::ok(vec![]))));
        mock.push_response(Err(TransportFailure::Timeout));

        assert!(mock
            .execute(batch(), Duration::from_secs(1))
            .await
            .is_ok());
        assert!(matches!(
            mock.execute(batch(), Duration::from_secs(1)).await,
            Err(TransportFailure::Timeout)
        ));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_without_responses_fails_as_connect() {
        let mock = MockExecutor::new();
        let result = mock.execute(batch(), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(TransportFailure::Connect(_))));
    }

    #[test]
    fn failure_display() {
        let failure = TransportFailure::Status {
            code: 503,
            body: "unavailable".into(),
        };
        assert!(failure.to_string().contains("503"));
    }
}
