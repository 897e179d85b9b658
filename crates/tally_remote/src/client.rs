//! The remote client: pre-flight checks, retry, classification, health.

use crate::config::RemoteConfig;
use crate::connectivity::{ConnectivityCache, ConnectivityProbe};
use crate::error::{RemoteError, RemoteResult};
use crate::executor::{StatementExecutor, TransportFailure};
use crate::wire::{QueryResponse, Row, Statement, StatementBatch};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Per-call overrides for [`RemoteClient::query_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Overrides the configured attempt bound.
    pub max_attempts: Option<u32>,
    /// Overrides the configured per-request timeout.
    pub timeout: Option<Duration>,
}

/// Health snapshot of the remote connection.
#[derive(Debug, Clone, Default)]
pub struct RemoteHealth {
    /// True if an endpoint is configured.
    pub is_configured: bool,
    /// Last successful call, epoch milliseconds.
    pub last_healthy_at: Option<i64>,
    /// Latency of the last successful call.
    pub last_latency_ms: Option<i64>,
    /// Message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
    /// Remaining circuit cool-down, if the circuit is open.
    pub circuit_open_for: Option<Duration>,
}

/// Client for the remote relational store.
///
/// All failure classification happens here, once per call: the transport
/// reports structural signals and every caller above sees only
/// [`RemoteError`] variants.
pub struct RemoteClient<E: StatementExecutor> {
    config: RemoteConfig,
    executor: E,
    probe: Arc<dyn ConnectivityProbe>,
    connectivity: ConnectivityCache,
    circuit_open_until: RwLock<Option<Instant>>,
    last_healthy_at: AtomicI64,
    last_latency_ms: AtomicI64,
    last_error: RwLock<Option<String>>,
    last_constraint_log: Mutex<Option<Instant>>,
}

impl<E: StatementExecutor> RemoteClient<E> {
    /// Creates a client over the given transport and connectivity probe.
    pub fn new(config: RemoteConfig, executor: E, probe: Arc<dyn ConnectivityProbe>) -> Self {
        let connectivity = ConnectivityCache::new(config.connectivity_ttl);
        Self {
            config,
            executor,
            probe,
            connectivity,
            circuit_open_until: RwLock::new(None),
            last_healthy_at: AtomicI64::new(0),
            last_latency_ms: AtomicI64::new(-1),
            last_error: RwLock::new(None),
            last_constraint_log: Mutex::new(None),
        }
    }

    /// Executes one parameterized statement with the configured policy.
    pub async fn query(&self, sql: &str, args: Vec<Value>) -> RemoteResult<Vec<Row>> {
        self.query_with(sql, args, QueryOptions::default()).await
    }

    /// Executes one parameterized statement with per-call overrides.
    ///
    /// Pre-flight: a cached connectivity probe (offline fails fast with no
    /// network attempt and opens the circuit briefly) and the circuit
    /// breaker. Transient failures are retried with exponential backoff
    /// and open the circuit for the same duration; auth and permanent
    /// failures return immediately.
    pub async fn query_with(
        &self,
        sql: &str,
        args: Vec<Value>,
        options: QueryOptions,
    ) -> RemoteResult<Vec<Row>> {
        if !self.config.is_configured() {
            return Err(RemoteError::NotConfigured);
        }

        if !self.connectivity.get(self.probe.as_ref()).is_online() {
            self.trip_circuit(self.config.offline_cooldown);
            let error = RemoteError::Offline;
            self.note_failure(&error);
            return Err(error);
        }

        if let Some(retry_in) = self.circuit_remaining() {
            return Err(RemoteError::CircuitOpen { retry_in });
        }

        let max_attempts = options
            .max_attempts
            .unwrap_or(self.config.retry.max_attempts)
            .max(1);
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let batch = StatementBatch::single(Statement::new(sql, args));

        let mut last_error = None;
        for attempt in 0..max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry.delay_for_attempt(attempt)).await;
            }

            let started = Instant::now();
            match self.executor.execute(batch.clone(), timeout).await {
                Ok(response) => match Self::unwrap_first_result(response) {
                    Ok(rows) => {
                        self.note_healthy(started.elapsed());
                        return Ok(rows);
                    }
                    Err(error) => {
                        // Statement-level failures are permanent; retrying
                        // the same statement cannot change the outcome.
                        self.note_failure(&error);
                        return Err(error);
                    }
                },
                Err(failure) => {
                    let error = classify(failure);
                    if error.is_retryable() {
                        let cooldown = self.config.retry.delay_for_attempt(attempt + 1);
                        self.trip_circuit(cooldown);
                        tracing::debug!(attempt, error = %error, "transient remote failure");
                        last_error = Some(error);
                        continue;
                    }
                    self.note_failure(&error);
                    return Err(error);
                }
            }
        }

        let error = last_error.unwrap_or(RemoteError::Transient {
            message: "no attempts made".to_string(),
        });
        self.note_failure(&error);
        Err(error)
    }

    /// Returns the current health snapshot.
    pub fn health(&self) -> RemoteHealth {
        let last_healthy_at = self.last_healthy_at.load(Ordering::Relaxed);
        let last_latency_ms = self.last_latency_ms.load(Ordering::Relaxed);
        RemoteHealth {
            is_configured: self.config.is_configured(),
            last_healthy_at: (last_healthy_at > 0).then_some(last_healthy_at),
            last_latency_ms: (last_latency_ms >= 0).then_some(last_latency_ms),
            last_error: self.last_error.read().clone(),
            circuit_open_for: self.circuit_remaining(),
        }
    }

    fn unwrap_first_result(response: QueryResponse) -> RemoteResult<Vec<Row>> {
        let Some(result) = response.results.into_iter().next() else {
            return Err(RemoteError::Permanent {
                message: "response carried no statement result".to_string(),
                constraint: false,
            });
        };
        if let Some(message) = result.error {
            return Err(RemoteError::Permanent {
                constraint: is_constraint_message(&message),
                message,
            });
        }
        Ok(result.rows)
    }

    fn circuit_remaining(&self) -> Option<Duration> {
        let until = *self.circuit_open_until.read();
        until.and_then(|until| until.checked_duration_since(Instant::now()))
    }

    fn trip_circuit(&self, cooldown: Duration) {
        let until = Instant::now() + cooldown;
        let mut slot = self.circuit_open_until.write();
        if (*slot).map_or(true, |existing| until > existing) {
            *slot = Some(until);
        }
    }

    fn note_healthy(&self, latency: Duration) {
        *self.circuit_open_until.write() = None;
        self.last_healthy_at
            .store(now_unix_millis(), Ordering::Relaxed);
        self.last_latency_ms
            .store(latency.as_millis() as i64, Ordering::Relaxed);
        *self.last_error.write() = None;
    }

    fn note_failure(&self, error: &RemoteError) {
        *self.last_error.write() = Some(error.to_string());
        if error.is_constraint() {
            // Callers treat constraint violations as idempotent no-ops;
            // cap the log volume to one line per window.
            let mut last = self.last_constraint_log.lock();
            let due = (*last).map_or(true, |at| at.elapsed() >= self.config.constraint_log_window);
            if due {
                tracing::warn!(error = %error, "remote rejected duplicate write");
                *last = Some(Instant::now());
            }
        } else {
            tracing::warn!(error = %error, "remote call failed");
        }
    }
}

fn now_unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis() as i64)
}

fn is_constraint_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("unique constraint") || lower.contains("duplicate key")
}

/// Classifies a transport failure. The single classification point.
fn classify(failure: TransportFailure) -> RemoteError {
    match failure {
        TransportFailure::Timeout => RemoteError::Transient {
            message: "request timed out".to_string(),
        },
        TransportFailure::Connect(message) => RemoteError::Transient { message },
        TransportFailure::Status { code: 401, body } | TransportFailure::Status { code: 403, body } => {
            RemoteError::Auth { message: body }
        }
        TransportFailure::Status { code, body } if code >= 500 || code == 429 => {
            RemoteError::Transient {
                message: format!("HTTP {code}: {body}"),
            }
        }
        TransportFailure::Status { code, body } => RemoteError::Permanent {
            constraint: is_constraint_message(&body),
            message: format!("HTTP {code}: {body}"),
        },
        TransportFailure::Decode(message) => RemoteError::Permanent {
            message,
            constraint: false,
        },
    }
}
