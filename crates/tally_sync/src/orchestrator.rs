//! The sync orchestrator: sequencing, single-flight, throttling.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::pull::{PullEngine, PullOutcome};
use crate::push::{PushEngine, PushOutcome};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tally_core::now_millis;
use tally_remote::{RemoteClient, StatementExecutor};
use tally_store::LocalStore;

/// Why a sync call was skipped. Skips are results, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A cycle is already in flight; the call does not queue.
    AlreadyRunning,
    /// The previous cycle started too recently.
    Throttled,
}

/// Result of a full-sync call.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// A cycle ran. Phase entries are `None` when that phase failed
    /// after exhausting its retries.
    Completed(SyncReport),
    /// The call was skipped without touching the network.
    Skipped(SkipReason),
}

impl SyncOutcome {
    /// Returns true for a skip result.
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped(_))
    }
}

/// What a completed cycle accomplished.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Push phase result, if the phase succeeded.
    pub push: Option<PushOutcome>,
    /// Pull phase result, if the phase succeeded.
    pub pull: Option<PullOutcome>,
}

/// Counters over the engine's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that ran to completion (possibly with failed phases).
    pub cycles_completed: u64,
    /// Calls skipped by single-flight or throttling.
    pub cycles_skipped: u64,
    /// Rows acknowledged by push.
    pub rows_pushed: u64,
    /// Rows applied by pull.
    pub rows_pulled: u64,
    /// Phase retry attempts taken.
    pub phase_retries: u64,
    /// Most recent swallowed phase error.
    pub last_error: Option<String>,
    /// Start of the most recent cycle, epoch milliseconds.
    pub last_cycle_at: Option<i64>,
}

/// Clears the running flag even when a phase panics, so a failure can
/// never wedge future cycles.
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Sequences push then pull with single-flight execution and throttling.
///
/// All cycle state lives on the instance; independent engines (as in
/// tests) are fully isolated from each other.
pub struct SyncEngine<E: StatementExecutor> {
    push_engine: PushEngine<E>,
    pull_engine: PullEngine<E>,
    config: SyncConfig,
    running: AtomicBool,
    last_cycle_start: RwLock<Option<Instant>>,
    stats: RwLock<SyncStats>,
}

impl<E: StatementExecutor> SyncEngine<E> {
    /// Creates a sync engine over a shared store and remote client.
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<RemoteClient<E>>,
        config: SyncConfig,
    ) -> Self {
        Self {
            push_engine: PushEngine::new(store.clone(), remote.clone(), config.clone()),
            pull_engine: PullEngine::new(store, remote, config.clone()),
            config,
            running: AtomicBool::new(false),
            last_cycle_start: RwLock::new(None),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns true while a cycle is in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns a copy of the lifetime counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Runs one full cycle: push, then pull. Never returns an error.
    ///
    /// A call while a cycle is in flight, or within the minimum interval
    /// of the previous cycle's start, returns a skip result immediately.
    /// Each phase is retried on transient failures only; a phase that
    /// still fails is logged and swallowed so the sibling phase runs.
    pub async fn run_full_sync(&self) -> SyncOutcome {
        if let Some(started) = *self.last_cycle_start.read() {
            if started.elapsed() < self.config.min_cycle_interval {
                tracing::debug!("sync skipped: last cycle started too recently");
                self.stats.write().cycles_skipped += 1;
                return SyncOutcome::Skipped(SkipReason::Throttled);
            }
        }

        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("sync skipped: already running");
            self.stats.write().cycles_skipped += 1;
            return SyncOutcome::Skipped(SkipReason::AlreadyRunning);
        }
        let _guard = RunningGuard {
            flag: &self.running,
        };

        *self.last_cycle_start.write() = Some(Instant::now());
        self.stats.write().last_cycle_at = Some(now_millis());

        // Push resolves fully before pull starts, so this device's own
        // writes are on the remote before remote state is merged back.
        let push = self.run_phase("push", || self.push_engine.push()).await;
        let pull = self.run_phase("pull", || self.pull_engine.pull()).await;

        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            if let Some(outcome) = &push {
                stats.rows_pushed += outcome.total() as u64;
            }
            if let Some(outcome) = &pull {
                stats.rows_pulled += outcome.pulled;
            }
        }

        tracing::info!(
            pushed = push.as_ref().map(|p| p.total()),
            pulled = pull.as_ref().map(|p| p.pulled),
            "sync cycle finished"
        );
        SyncOutcome::Completed(SyncReport { push, pull })
    }

    /// Runs one phase under the bounded retry policy, swallowing its
    /// final failure so the sibling phase still executes.
    async fn run_phase<T, F, Fut>(&self, phase: &'static str, run: F) -> Option<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let retry = &self.config.phase_retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut last_error: Option<SyncError> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
                self.stats.write().phase_retries += 1;
            }
            match run().await {
                Ok(value) => return Some(value),
                Err(error) => {
                    if error.is_retryable() && attempt + 1 < max_attempts {
                        tracing::debug!(phase, attempt, %error, "phase attempt failed, retrying");
                        last_error = Some(error);
                        continue;
                    }
                    last_error = Some(error);
                    break;
                }
            }
        }

        if let Some(error) = last_error {
            tracing::warn!(phase, %error, "phase failed, continuing cycle");
            self.stats.write().last_error = Some(error.to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tally_remote::{
        AssumeOnline, MockExecutor, QueryResponse, RemoteConfig, RetryConfig, StatementResult,
    };

    fn engine(
        min_interval: Duration,
    ) -> (SyncEngine<Arc<MockExecutor>>, Arc<MockExecutor>) {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let executor = Arc::new(MockExecutor::new());
        let remote = Arc::new(RemoteClient::new(
            RemoteConfig::new("https://ledger.example.com/v1/query")
                .with_retry(RetryConfig::no_retry()),
            executor.clone(),
            Arc::new(AssumeOnline),
        ));
        let config = SyncConfig::new("u1")
            .with_min_cycle_interval(min_interval)
            .with_phase_retry(RetryConfig::no_retry());
        (SyncEngine::new(store, remote, config), executor)
    }

    #[tokio::test]
    async fn empty_cycle_completes() {
        let (engine, executor) = engine(Duration::ZERO);
        // No dirty rows, so only the pull statement goes out.
        executor.push_response(Ok(QueryResponse::single(StatementResult::ok(vec![]))));

        let outcome = engine.run_full_sync().await;
        match outcome {
            SyncOutcome::Completed(report) => {
                assert_eq!(report.push.unwrap().total(), 0);
                assert_eq!(report.pull.unwrap().pulled, 0);
            }
            SyncOutcome::Skipped(_) => panic!("cycle should have run"),
        }
        assert_eq!(executor.call_count(), 1);
        assert_eq!(engine.stats().cycles_completed, 1);
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn second_call_within_interval_is_throttled() {
        let (engine, executor) = engine(Duration::from_secs(30));
        executor.push_response(Ok(QueryResponse::single(StatementResult::ok(vec![]))));

        assert!(!engine.run_full_sync().await.is_skipped());

        let outcome = engine.run_full_sync().await;
        assert!(matches!(
            outcome,
            SyncOutcome::Skipped(SkipReason::Throttled)
        ));
        assert_eq!(engine.stats().cycles_skipped, 1);
    }

    #[tokio::test]
    async fn call_while_running_is_skipped() {
        let (engine, _executor) = engine(Duration::ZERO);
        engine.running.store(true, Ordering::SeqCst);

        let outcome = engine.run_full_sync().await;
        assert!(matches!(
            outcome,
            SyncOutcome::Skipped(SkipReason::AlreadyRunning)
        ));
    }

    #[tokio::test]
    async fn failed_pull_phase_is_swallowed() {
        let (engine, _executor) = engine(Duration::ZERO);
        // No queued response: the mock fails the pull with a connect
        // error, which the phase wrapper swallows.
        let outcome = engine.run_full_sync().await;
        match outcome {
            SyncOutcome::Completed(report) => {
                assert!(report.push.is_some());
                assert!(report.pull.is_none());
            }
            SyncOutcome::Skipped(_) => panic!("cycle should have run"),
        }
        assert!(engine.stats().last_error.is_some());
        assert!(!engine.is_running());
    }
}
