//! Configuration for the sync engine.

use std::time::Duration;
use tally_remote::RetryConfig;

/// Which remote column drives the pull cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// Per-user `server_version` watermark (primary deployment mode).
    ServerVersion,
    /// `updated_at` timestamp watermark.
    UpdatedAt,
}

/// Configuration for sync cycles.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// User whose rows are synchronized.
    pub user_id: String,
    /// Marker identifying this device in pushed rows.
    pub client_id: Option<String>,
    /// Rows per push upsert statement.
    pub push_batch_size: usize,
    /// Row cap per pull page.
    pub pull_page_size: u32,
    /// Minimum spacing between cycle starts; closer calls are skipped.
    pub min_cycle_interval: Duration,
    /// Retry policy applied per phase (transient failures only).
    pub phase_retry: RetryConfig,
    /// Cursor column selection.
    pub cursor_mode: CursorMode,
}

impl SyncConfig {
    /// Creates a configuration for the given user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            client_id: None,
            push_batch_size: 50,
            pull_page_size: 500,
            min_cycle_interval: Duration::from_secs(30),
            phase_retry: RetryConfig::default(),
            cursor_mode: CursorMode::ServerVersion,
        }
    }

    /// Sets the device marker.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the push batch size.
    pub fn with_push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = size;
        self
    }

    /// Sets the pull page cap.
    pub fn with_pull_page_size(mut self, size: u32) -> Self {
        self.pull_page_size = size;
        self
    }

    /// Sets the minimum cycle spacing.
    pub fn with_min_cycle_interval(mut self, interval: Duration) -> Self {
        self.min_cycle_interval = interval;
        self
    }

    /// Sets the per-phase retry policy.
    pub fn with_phase_retry(mut self, retry: RetryConfig) -> Self {
        self.phase_retry = retry;
        self
    }

    /// Sets the cursor mode.
    pub fn with_cursor_mode(mut self, mode: CursorMode) -> Self {
        self.cursor_mode = mode;
        self
    }
}
