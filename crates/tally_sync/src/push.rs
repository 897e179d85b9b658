//! The push path: flush local dirty rows to the remote store.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tally_core::Transaction;
use tally_remote::{RemoteClient, StatementExecutor};
use tally_store::LocalStore;
use uuid::Uuid;

/// Client-owned columns, in bind order. Server-assigned columns
/// (`server_version`, `updated_at`) are never sent; the remote computes
/// them and returns them per row.
const PUSH_COLUMNS: &str =
    "id, user_id, client_id, kind, amount, category, note, currency, date, created_at, deleted_at";
const PUSH_COLUMN_COUNT: usize = 11;

/// Result of one push run.
#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    /// Ids acknowledged as live upserts.
    pub pushed: Vec<Uuid>,
    /// Ids acknowledged as deletions.
    pub deleted: Vec<Uuid>,
}

impl PushOutcome {
    /// Total acknowledged rows.
    pub fn total(&self) -> usize {
        self.pushed.len() + self.deleted.len()
    }
}

/// Server acknowledgment for one upserted row.
#[derive(Debug, Deserialize)]
struct PushAck {
    id: Uuid,
    server_version: i64,
    updated_at: i64,
}

/// Flushes dirty local rows to the remote store.
pub struct PushEngine<E: StatementExecutor> {
    store: Arc<LocalStore>,
    remote: Arc<RemoteClient<E>>,
    config: SyncConfig,
}

impl<E: StatementExecutor> PushEngine<E> {
    /// Creates a push engine.
    pub fn new(store: Arc<LocalStore>, remote: Arc<RemoteClient<E>>, config: SyncConfig) -> Self {
        Self {
            store,
            remote,
            config,
        }
    }

    /// Pushes the current dirty set.
    ///
    /// Rows are batched into multi-row upserts. A batch rejected as
    /// permanent falls back to per-row submission so one malformed row
    /// cannot block the rest; failed rows are logged and stay dirty for
    /// the next cycle (at-least-once). Transient, auth, and offline
    /// failures propagate to the caller's phase retry instead.
    pub async fn push(&self) -> SyncResult<PushOutcome> {
        let dirty = self.store.get_dirty()?;
        let mut outcome = PushOutcome::default();
        if dirty.is_empty() {
            return Ok(outcome);
        }
        tracing::debug!(rows = dirty.len(), "pushing dirty rows");

        for batch in dirty.chunks(self.config.push_batch_size.max(1)) {
            match self.push_rows(batch).await {
                Ok(acks) => self.reconcile(batch, acks, &mut outcome)?,
                Err(error) if error.is_permanent_remote() => {
                    if batch.len() == 1 {
                        tracing::warn!(id = %batch[0].id, %error, "row rejected, left dirty for next cycle");
                        continue;
                    }
                    tracing::warn!(%error, rows = batch.len(), "batch rejected, isolating rows");
                    for row in batch {
                        let single = std::slice::from_ref(row);
                        match self.push_rows(single).await {
                            Ok(acks) => self.reconcile(single, acks, &mut outcome)?,
                            Err(error) => {
                                tracing::warn!(id = %row.id, %error, "row left dirty for next cycle");
                            }
                        }
                    }
                }
                Err(error) => return Err(error),
            }
        }

        Ok(outcome)
    }

    async fn push_rows(&self, rows: &[Transaction]) -> SyncResult<Vec<PushAck>> {
        let sql = upsert_sql(rows.len());
        let mut args = Vec::with_capacity(rows.len() * PUSH_COLUMN_COUNT);
        for row in rows {
            bind_row(row, &mut args);
        }

        let returned = self.remote.query(&sql, args).await?;
        let mut acks = Vec::with_capacity(returned.len());
        for row in returned {
            match serde_json::from_value::<PushAck>(Value::Object(row)) {
                Ok(ack) => acks.push(ack),
                Err(error) => tracing::warn!(%error, "unparseable upsert acknowledgment"),
            }
        }
        Ok(acks)
    }

    fn reconcile(
        &self,
        sent: &[Transaction],
        acks: Vec<PushAck>,
        outcome: &mut PushOutcome,
    ) -> SyncResult<()> {
        for ack in acks {
            let Some(sent_row) = sent.iter().find(|row| row.id == ack.id) else {
                tracing::warn!(id = %ack.id, "acknowledgment for a row we did not send");
                continue;
            };
            let tombstoned = sent_row.deleted_at.is_some();
            if !self
                .store
                .mark_synced(ack.id, ack.server_version, ack.updated_at, tombstoned)?
            {
                tracing::warn!(id = %ack.id, "acknowledged row no longer exists locally");
                continue;
            }
            if tombstoned {
                outcome.deleted.push(ack.id);
            } else {
                outcome.pushed.push(ack.id);
            }
        }
        Ok(())
    }
}

fn upsert_sql(rows: usize) -> String {
    let tuple = "(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";
    let values = vec![tuple; rows].join(", ");
    format!(
        "INSERT INTO transactions ({PUSH_COLUMNS}) VALUES {values} \
         ON CONFLICT(id) DO UPDATE SET \
         user_id = excluded.user_id, \
         client_id = excluded.client_id, \
         kind = excluded.kind, \
         amount = excluded.amount, \
         category = excluded.category, \
         note = excluded.note, \
         currency = excluded.currency, \
         date = excluded.date, \
         deleted_at = COALESCE(transactions.deleted_at, excluded.deleted_at) \
         RETURNING id, server_version, updated_at"
    )
}

fn bind_row(row: &Transaction, args: &mut Vec<Value>) {
    args.push(json!(row.id.to_string()));
    args.push(json!(row.user_id));
    args.push(json!(row.client_id));
    args.push(json!(row.kind.as_str()));
    args.push(json!(row.amount));
    args.push(json!(row.category));
    args.push(json!(row.note));
    args.push(json!(row.currency));
    args.push(json!(row.date.format("%Y-%m-%d").to_string()));
    args.push(json!(row.created_at));
    args.push(json!(row.deleted_at));
}
