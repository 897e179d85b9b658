//! The pull path: incremental fetch and conflict resolution.

use crate::config::{CursorMode, SyncConfig};
use crate::error::SyncResult;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tally_core::{SyncStatus, Transaction, TransactionKind};
use tally_remote::{RemoteClient, StatementExecutor};
use tally_store::{meta_key_timestamp_cursor, meta_key_version_cursor, LocalStore, RowSyncMeta};
use uuid::Uuid;

/// Result of one pull run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullOutcome {
    /// Rows applied locally (inserts, overwrites, tombstones).
    pub pulled: u64,
    /// The watermark after this run.
    pub last_sync: i64,
}

/// A remote row, as fetched from the pull statement.
#[derive(Debug, Clone, Deserialize)]
struct RemoteRow {
    id: Uuid,
    user_id: String,
    #[serde(default)]
    client_id: Option<String>,
    kind: TransactionKind,
    amount: f64,
    category: String,
    #[serde(default)]
    note: Option<String>,
    currency: String,
    date: NaiveDate,
    created_at: i64,
    updated_at: i64,
    #[serde(default)]
    deleted_at: Option<i64>,
    server_version: i64,
}

impl RemoteRow {
    fn cursor(&self, mode: CursorMode) -> i64 {
        match mode {
            CursorMode::ServerVersion => self.server_version,
            CursorMode::UpdatedAt => self.updated_at,
        }
    }

    /// True if the remote row encodes a delete: a delete timestamp no
    /// newer than its own `updated_at`.
    fn encodes_delete(&self) -> bool {
        self.deleted_at.is_some_and(|at| at <= self.updated_at)
    }

    fn into_transaction(self, sync_status: SyncStatus) -> Transaction {
        Transaction {
            id: self.id,
            user_id: self.user_id,
            client_id: self.client_id,
            kind: self.kind,
            amount: self.amount,
            category: self.category,
            note: self.note,
            currency: self.currency,
            date: self.date,
            server_version: self.server_version,
            sync_status,
            need_sync: false,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

/// The per-row resolution, in strict priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PullDecision {
    /// Local tombstone wins unconditionally; deletes never resurrect.
    SkipTombstoned,
    /// Remote delete is newer; propagate it as a local tombstone.
    ApplyTombstone,
    /// Unacknowledged local edit is at least as new; keep it.
    KeepLocalEdit,
    /// Remote row is strictly newer; overwrite local state.
    ApplyRemote,
    /// Remote row is stale or equal; nothing to do.
    Stale,
}

/// The conflict decision rule.
fn decide(
    local: Option<RowSyncMeta>,
    remote_updated_at: i64,
    remote_encodes_delete: bool,
) -> PullDecision {
    if let Some(meta) = local {
        if meta.sync_status == SyncStatus::Tombstoned {
            return PullDecision::SkipTombstoned;
        }
    }

    let remote_is_newer = local.map_or(true, |meta| remote_updated_at > meta.updated_at);

    if remote_encodes_delete && remote_is_newer {
        return PullDecision::ApplyTombstone;
    }

    if let Some(meta) = local {
        if meta.sync_status == SyncStatus::Pending && meta.updated_at >= remote_updated_at {
            return PullDecision::KeepLocalEdit;
        }
    }

    if remote_is_newer {
        PullDecision::ApplyRemote
    } else {
        PullDecision::Stale
    }
}

/// Fetches remote changes past the watermark and merges them locally.
pub struct PullEngine<E: StatementExecutor> {
    store: Arc<LocalStore>,
    remote: Arc<RemoteClient<E>>,
    config: SyncConfig,
}

impl<E: StatementExecutor> PullEngine<E> {
    /// Creates a pull engine.
    pub fn new(store: Arc<LocalStore>, remote: Arc<RemoteClient<E>>, config: SyncConfig) -> Self {
        Self {
            store,
            remote,
            config,
        }
    }

    fn cursor_key(&self) -> String {
        match self.config.cursor_mode {
            CursorMode::ServerVersion => meta_key_version_cursor(&self.config.user_id),
            CursorMode::UpdatedAt => meta_key_timestamp_cursor(),
        }
    }

    fn pull_sql(&self) -> String {
        let cursor_column = match self.config.cursor_mode {
            CursorMode::ServerVersion => "server_version",
            CursorMode::UpdatedAt => "updated_at",
        };
        format!(
            "SELECT id, user_id, client_id, kind, amount, category, note, currency, date, \
             created_at, updated_at, deleted_at, server_version \
             FROM transactions \
             WHERE user_id = ? AND {cursor_column} > ? \
             ORDER BY {cursor_column} ASC \
             LIMIT ?"
        )
    }

    /// Pulls one page of remote changes.
    ///
    /// Rows are processed in ascending cursor order; repeated ids within a
    /// page are dropped defensively. The watermark tracks only rows that
    /// were actually applied and is persisted after the page completes. A
    /// row that fails to parse or apply ends the page early, so the rows
    /// behind it are refetched on the next run instead of being silently
    /// skipped.
    pub async fn pull(&self) -> SyncResult<PullOutcome> {
        let cursor_key = self.cursor_key();
        let watermark = self.store.meta_get_i64(&cursor_key)?.unwrap_or(0);

        let rows = self
            .remote
            .query(
                &self.pull_sql(),
                vec![
                    json!(self.config.user_id),
                    json!(watermark),
                    json!(self.config.pull_page_size),
                ],
            )
            .await?;
        tracing::debug!(rows = rows.len(), watermark, "pull page fetched");

        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut applied_max: Option<i64> = None;
        let mut pulled = 0u64;

        for raw in rows {
            let row: RemoteRow = match serde_json::from_value(Value::Object(raw)) {
                Ok(row) => row,
                Err(error) => {
                    tracing::warn!(%error, "unparseable remote row, page ended early");
                    break;
                }
            };
            if !seen.insert(row.id) {
                tracing::debug!(id = %row.id, "duplicate id within page");
                continue;
            }

            let local = match self.store.sync_meta(row.id) {
                Ok(local) => local,
                Err(error) => {
                    tracing::warn!(id = %row.id, %error, "local lookup failed, page ended early");
                    break;
                }
            };

            let cursor = row.cursor(self.config.cursor_mode);
            let decision = decide(local, row.updated_at, row.encodes_delete());

            let applied = match decision {
                PullDecision::SkipTombstoned => {
                    tracing::debug!(id = %row.id, "local tombstone wins");
                    Ok(false)
                }
                PullDecision::KeepLocalEdit => {
                    tracing::debug!(id = %row.id, "pending local edit wins");
                    Ok(false)
                }
                PullDecision::Stale => Ok(false),
                PullDecision::ApplyTombstone => self
                    .store
                    .upsert_from_remote(&row.into_transaction(SyncStatus::Tombstoned))
                    .map(|_| true),
                PullDecision::ApplyRemote => self
                    .store
                    .upsert_from_remote(&row.into_transaction(SyncStatus::Synced))
                    .map(|_| true),
            };

            match applied {
                Ok(true) => {
                    pulled += 1;
                    applied_max = Some(applied_max.map_or(cursor, |max| max.max(cursor)));
                }
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(%error, "failed to apply remote row, page ended early");
                    break;
                }
            }
        }

        let last_sync = match applied_max {
            Some(max) if max > watermark => {
                self.store.meta_set_i64(&cursor_key, max)?;
                max
            }
            _ => watermark,
        };

        Ok(PullOutcome { pulled, last_sync })
    }
}
