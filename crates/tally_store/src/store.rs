//! The local transaction store.

use crate::error::{StoreError, StoreResult};
use crate::schema;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tally_core::{
    now_millis, ChangeEvent, ChangeFeed, CoreError, NewTransaction, SyncStatus, Transaction,
    TransactionPatch,
};
use uuid::Uuid;

const COLUMNS: &str = "id, user_id, client_id, kind, amount, category, note, currency, date, \
                       server_version, sync_status, need_sync, created_at, updated_at, deleted_at";

/// Outcome of a remote-apply upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// No local row existed; the remote row was inserted.
    Inserted,
    /// An existing local row was overwritten.
    Updated,
}

/// The sync-relevant slice of a local row, used for pull decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSyncMeta {
    /// Last local mutation time, epoch milliseconds.
    pub updated_at: i64,
    /// Current sync state.
    pub sync_status: SyncStatus,
}

/// Income/expense totals for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonthlySummary {
    /// Sum of income amounts.
    pub income: f64,
    /// Sum of expense amounts.
    pub expense: f64,
}

impl MonthlySummary {
    /// Income minus expense.
    pub fn net(&self) -> f64 {
        self.income - self.expense
    }
}

/// SQLite-backed store for the `transactions` and `meta` tables.
///
/// All methods take `&self`; the connection is guarded by a mutex that is
/// never held across an await point, so the store can be shared freely
/// between the app layer and the sync engine.
pub struct LocalStore {
    pub(crate) conn: Mutex<Connection>,
    feed: ChangeFeed,
}

impl LocalStore {
    /// Opens (and bootstraps) a store at the given filesystem path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory store (primarily for tests).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        // WAL is unsupported for in-memory databases; ignore that failure.
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            feed: ChangeFeed::new(),
        })
    }

    /// The change feed fed by this store's mutations.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Inserts a new local transaction: `Pending`, dirty, version zero.
    pub fn add(&self, new: NewTransaction) -> StoreResult<Transaction> {
        let row = new.into_transaction();
        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO transactions (id, user_id, client_id, kind, amount, category, note, \
                 currency, date, server_version, sync_status, need_sync, created_at, updated_at, \
                 deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    row.id.to_string(),
                    row.user_id,
                    row.client_id,
                    row.kind.as_str(),
                    row.amount,
                    row.category,
                    row.note,
                    row.currency,
                    row.date.format("%Y-%m-%d").to_string(),
                    row.server_version,
                    row.sync_status.to_code(),
                    i64::from(row.need_sync),
                    row.created_at,
                    row.updated_at,
                    row.deleted_at,
                ],
            )?;
        }
        tracing::debug!(id = %row.id, "transaction added");
        self.feed.emit(ChangeEvent::inserted(row.id, row.user_id.as_str()));
        Ok(row)
    }

    /// Applies a partial edit to an existing transaction.
    ///
    /// Tombstoned rows reject the edit with a domain error; otherwise the
    /// present patch fields are merged over the row, which becomes dirty
    /// and `Pending` again.
    pub fn update(&self, id: Uuid, patch: &TransactionPatch) -> StoreResult<Transaction> {
        let row = {
            let conn = self.conn.lock();
            let mut row = Self::query_one(&conn, id)?.ok_or(CoreError::NotFound { id })?;
            if row.is_tombstoned() {
                return Err(CoreError::TombstonedEdit { id }.into());
            }

            patch.apply_to(&mut row);
            row.need_sync = true;
            row.sync_status = SyncStatus::Pending;
            row.updated_at = now_millis();

            conn.execute(
                "UPDATE transactions
                 SET kind = ?1, amount = ?2, category = ?3, note = ?4, currency = ?5, date = ?6,
                     need_sync = 1, sync_status = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    row.kind.as_str(),
                    row.amount,
                    row.category,
                    row.note,
                    row.currency,
                    row.date.format("%Y-%m-%d").to_string(),
                    row.sync_status.to_code(),
                    row.updated_at,
                    id.to_string(),
                ],
            )?;
            row
        };
        self.feed.emit(ChangeEvent::updated(id, row.user_id.as_str()));
        Ok(row)
    }

    /// Marks a transaction deleted. Idempotent: `deleted_at` is write-once
    /// and a repeated delete only bumps `updated_at`.
    pub fn delete(&self, id: Uuid, user_id: &str) -> StoreResult<()> {
        let now = now_millis();
        let changed = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE transactions
                 SET deleted_at = COALESCE(deleted_at, ?1),
                     sync_status = ?2,
                     need_sync = 1,
                     updated_at = ?1
                 WHERE id = ?3 AND user_id = ?4",
                params![
                    now,
                    SyncStatus::Tombstoned.to_code(),
                    id.to_string(),
                    user_id
                ],
            )?
        };
        if changed == 0 {
            return Err(CoreError::NotFound { id }.into());
        }
        tracing::debug!(%id, "transaction tombstoned");
        self.feed.emit(ChangeEvent::tombstoned(id, user_id));
        Ok(())
    }

    /// Fetches a transaction by id, tombstoned rows included.
    pub fn get(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        let conn = self.conn.lock();
        Self::query_one(&conn, id)
    }

    /// Lists live (non-tombstoned) transactions for a user, newest first.
    pub fn list(&self, user_id: &str, limit: usize, offset: usize) -> StoreResult<Vec<Transaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM transactions
             WHERE user_id = ?1 AND deleted_at IS NULL
             ORDER BY date DESC, created_at DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
            .query_map(
                params![user_id, limit as i64, offset as i64],
                Self::parse_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Returns the push candidate set: rows with an unacknowledged local
    /// mutation, oldest mutation first.
    pub fn get_dirty(&self) -> StoreResult<Vec<Transaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM transactions
             WHERE need_sync = 1 OR sync_status IN (?1, ?2)
             ORDER BY updated_at ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    SyncStatus::Pending.to_code(),
                    SyncStatus::Tombstoned.to_code()
                ],
                Self::parse_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Loads the sync-relevant slice of a local row, if the row exists.
    pub fn sync_meta(&self, id: Uuid) -> StoreResult<Option<RowSyncMeta>> {
        let conn = self.conn.lock();
        let meta = conn
            .query_row(
                "SELECT updated_at, sync_status FROM transactions WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
                },
            )
            .optional()?;
        match meta {
            None => Ok(None),
            Some((updated_at, code)) => Ok(Some(RowSyncMeta {
                updated_at,
                sync_status: SyncStatus::from_code(code)?,
            })),
        }
    }

    /// Writes a remote row over local state. Pull-path only.
    ///
    /// The caller is responsible for conflict resolution and must never
    /// invoke this for a row whose local counterpart is tombstoned.
    /// `created_at` is preserved on conflict and `deleted_at` stays
    /// write-once regardless of the incoming value.
    pub fn upsert_from_remote(&self, row: &Transaction) -> StoreResult<Applied> {
        let applied = {
            let conn = self.conn.lock();
            let existed: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM transactions WHERE id = ?1",
                    params![row.id.to_string()],
                    |r| r.get(0),
                )
                .optional()?;

            conn.execute(
                "INSERT INTO transactions (id, user_id, client_id, kind, amount, category, note, \
                 currency, date, server_version, sync_status, need_sync, created_at, updated_at, \
                 deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(id) DO UPDATE SET
                     user_id = excluded.user_id,
                     client_id = excluded.client_id,
                     kind = excluded.kind,
                     amount = excluded.amount,
                     category = excluded.category,
                     note = excluded.note,
                     currency = excluded.currency,
                     date = excluded.date,
                     server_version = excluded.server_version,
                     sync_status = excluded.sync_status,
                     need_sync = excluded.need_sync,
                     updated_at = excluded.updated_at,
                     deleted_at = COALESCE(transactions.deleted_at, excluded.deleted_at)",
                params![
                    row.id.to_string(),
                    row.user_id,
                    row.client_id,
                    row.kind.as_str(),
                    row.amount,
                    row.category,
                    row.note,
                    row.currency,
                    row.date.format("%Y-%m-%d").to_string(),
                    row.server_version,
                    row.sync_status.to_code(),
                    i64::from(row.need_sync),
                    row.created_at,
                    row.updated_at,
                    row.deleted_at,
                ],
            )?;

            if existed.is_some() {
                Applied::Updated
            } else {
                Applied::Inserted
            }
        };

        let event = match (applied, row.is_tombstoned()) {
            (_, true) => ChangeEvent::tombstoned(row.id, row.user_id.as_str()),
            (Applied::Inserted, false) => ChangeEvent::inserted(row.id, row.user_id.as_str()),
            (Applied::Updated, false) => ChangeEvent::updated(row.id, row.user_id.as_str()),
        };
        self.feed.emit(event);
        Ok(applied)
    }

    /// Acknowledges a pushed row: clears the dirty flag and adopts the
    /// server-assigned version and canonical `updated_at`.
    ///
    /// Returns false if the row vanished locally in the meantime.
    pub fn mark_synced(
        &self,
        id: Uuid,
        server_version: i64,
        updated_at: i64,
        tombstoned: bool,
    ) -> StoreResult<bool> {
        let status = if tombstoned {
            SyncStatus::Tombstoned
        } else {
            SyncStatus::Synced
        };
        let user_id = {
            let conn = self.conn.lock();
            let user_id: Option<String> = conn
                .query_row(
                    "SELECT user_id FROM transactions WHERE id = ?1",
                    params![id.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            let Some(user_id) = user_id else {
                return Ok(false);
            };
            conn.execute(
                "UPDATE transactions
                 SET need_sync = 0, sync_status = ?1, server_version = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![status.to_code(), server_version, updated_at, id.to_string()],
            )?;
            user_id
        };
        let event = if tombstoned {
            ChangeEvent::tombstoned(id, user_id)
        } else {
            ChangeEvent::updated(id, user_id)
        };
        self.feed.emit(event);
        Ok(true)
    }

    /// Income/expense totals for one calendar month, tombstones excluded.
    pub fn summarize(&self, user_id: &str, year: i32, month: u32) -> StoreResult<MonthlySummary> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(StoreError::InvalidMonth { year, month })?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or(StoreError::InvalidMonth { year, month })?;

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT kind, COALESCE(SUM(amount), 0)
             FROM transactions
             WHERE user_id = ?1 AND deleted_at IS NULL AND date >= ?2 AND date < ?3
             GROUP BY kind",
        )?;
        let totals = stmt
            .query_map(
                params![
                    user_id,
                    start.format("%Y-%m-%d").to_string(),
                    end.format("%Y-%m-%d").to_string()
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut summary = MonthlySummary::default();
        for (kind, total) in totals {
            match kind.as_str() {
                "income" => summary.income = total,
                "expense" => summary.expense = total,
                _ => {}
            }
        }
        Ok(summary)
    }

    fn query_one(conn: &Connection, id: Uuid) -> StoreResult<Option<Transaction>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM transactions WHERE id = ?1"),
                params![id.to_string()],
                Self::parse_row,
            )
            .optional()?;
        Ok(row)
    }

    fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
        use rusqlite::types::Type;

        let id: String = row.get(0)?;
        let id = Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

        let kind: String = row.get(3)?;
        let kind = kind
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

        let date: String = row.get(8)?;
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

        let status_code: i64 = row.get(10)?;
        let sync_status = SyncStatus::from_code(status_code).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, Type::Integer, Box::new(e))
        })?;

        Ok(Transaction {
            id,
            user_id: row.get(1)?,
            client_id: row.get(2)?,
            kind,
            amount: row.get(4)?,
            category: row.get(5)?,
            note: row.get(6)?,
            currency: row.get(7)?,
            date,
            server_version: row.get(9)?,
            sync_status,
            need_sync: row.get::<_, i64>(11)? != 0,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
            deleted_at: row.get(14)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::TransactionKind;

    fn store() -> LocalStore {
        LocalStore::open_in_memory().unwrap()
    }

    fn new_tx(user: &str, amount: f64) -> NewTransaction {
        NewTransaction::new(
            user,
            TransactionKind::Expense,
            amount,
            "groceries",
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        )
    }

    fn remote_row(id: Uuid, updated_at: i64, version: i64) -> Transaction {
        Transaction {
            id,
            user_id: "u1".to_string(),
            client_id: Some("other-device".to_string()),
            kind: TransactionKind::Income,
            amount: 99.0,
            category: "salary".to_string(),
            note: None,
            currency: "USD".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
            server_version: version,
            sync_status: SyncStatus::Synced,
            need_sync: false,
            created_at: 1,
            updated_at,
            deleted_at: None,
        }
    }

    #[test]
    fn add_produces_dirty_pending_row() {
        let store = store();
        let row = store.add(new_tx("u1", 10.0)).unwrap();

        let dirty = store.get_dirty().unwrap();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].id, row.id);
        assert!(dirty[0].need_sync);
        assert_eq!(dirty[0].sync_status, SyncStatus::Pending);
        assert_eq!(dirty[0].server_version, 0);
    }

    #[test]
    fn update_merges_and_redirties() {
        let store = store();
        let row = store.add(new_tx("u1", 10.0)).unwrap();
        store
            .mark_synced(row.id, 5, row.updated_at + 1, false)
            .unwrap();

        let patch = TransactionPatch {
            amount: Some(20.0),
            ..Default::default()
        };
        let updated = store.update(row.id, &patch).unwrap();

        assert_eq!(updated.amount, 20.0);
        assert_eq!(updated.category, "groceries");
        assert!(updated.need_sync);
        assert_eq!(updated.sync_status, SyncStatus::Pending);
    }

    #[test]
    fn update_missing_row_is_not_found() {
        let store = store();
        let err = store
            .update(Uuid::new_v4(), &TransactionPatch::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(CoreError::NotFound { .. })));
    }

    #[test]
    fn update_tombstoned_row_is_rejected() {
        let store = store();
        let row = store.add(new_tx("u1", 10.0)).unwrap();
        store.delete(row.id, "u1").unwrap();

        let err = store
            .update(row.id, &TransactionPatch::default())
            .unwrap_err();
        assert!(err.is_tombstoned_edit());
    }

    #[test]
    fn delete_is_idempotent_and_deleted_at_write_once() {
        let store = store();
        let row = store.add(new_tx("u1", 10.0)).unwrap();

        store.delete(row.id, "u1").unwrap();
        let first = store.get(row.id).unwrap().unwrap();
        let first_deleted_at = first.deleted_at.unwrap();
        assert_eq!(first.sync_status, SyncStatus::Tombstoned);
        assert!(first.need_sync);

        store.delete(row.id, "u1").unwrap();
        let second = store.get(row.id).unwrap().unwrap();
        assert_eq!(second.deleted_at.unwrap(), first_deleted_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn delete_checks_owner() {
        let store = store();
        let row = store.add(new_tx("u1", 10.0)).unwrap();
        let err = store.delete(row.id, "someone-else").unwrap_err();
        assert!(matches!(err, StoreError::Domain(CoreError::NotFound { .. })));
    }

    #[test]
    fn list_excludes_tombstones() {
        let store = store();
        let keep = store.add(new_tx("u1", 1.0)).unwrap();
        let gone = store.add(new_tx("u1", 2.0)).unwrap();
        store.delete(gone.id, "u1").unwrap();

        let rows = store.list("u1", 10, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, keep.id);
    }

    #[test]
    fn upsert_from_remote_inserts_then_updates() {
        let store = store();
        let id = Uuid::new_v4();

        let applied = store.upsert_from_remote(&remote_row(id, 100, 1)).unwrap();
        assert_eq!(applied, Applied::Inserted);

        let applied = store.upsert_from_remote(&remote_row(id, 200, 2)).unwrap();
        assert_eq!(applied, Applied::Updated);

        let row = store.get(id).unwrap().unwrap();
        assert_eq!(row.server_version, 2);
        assert_eq!(row.updated_at, 200);
        assert_eq!(row.sync_status, SyncStatus::Synced);
        assert!(!row.need_sync);
        // created_at from the first insert is preserved.
        assert_eq!(row.created_at, 1);
    }

    #[test]
    fn upsert_from_remote_never_clears_deleted_at() {
        let store = store();
        let row = store.add(new_tx("u1", 10.0)).unwrap();
        store.delete(row.id, "u1").unwrap();
        let deleted_at = store.get(row.id).unwrap().unwrap().deleted_at;

        // A remote payload without a delete marker must not clear it.
        let mut remote = remote_row(row.id, now_millis() + 10_000, 9);
        remote.sync_status = SyncStatus::Tombstoned;
        store.upsert_from_remote(&remote).unwrap();

        let after = store.get(row.id).unwrap().unwrap();
        assert_eq!(after.deleted_at, deleted_at);
    }

    #[test]
    fn mark_synced_adopts_server_metadata() {
        let store = store();
        let row = store.add(new_tx("u1", 10.0)).unwrap();

        assert!(store.mark_synced(row.id, 7, 12345, false).unwrap());
        let after = store.get(row.id).unwrap().unwrap();
        assert_eq!(after.server_version, 7);
        assert_eq!(after.updated_at, 12345);
        assert_eq!(after.sync_status, SyncStatus::Synced);
        assert!(!after.need_sync);

        assert!(!store.mark_synced(Uuid::new_v4(), 1, 1, false).unwrap());
    }

    #[test]
    fn summarize_month() {
        let store = store();
        store.add(new_tx("u1", 30.0)).unwrap();
        store
            .add(
                NewTransaction::new(
                    "u1",
                    TransactionKind::Income,
                    100.0,
                    "salary",
                    NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
                )
                .with_note("january pay"),
            )
            .unwrap();
        // Different month, must not count.
        store
            .add(NewTransaction::new(
                "u1",
                TransactionKind::Expense,
                500.0,
                "rent",
                NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            ))
            .unwrap();

        let summary = store.summarize("u1", 2026, 1).unwrap();
        assert_eq!(summary.income, 100.0);
        assert_eq!(summary.expense, 30.0);
        assert_eq!(summary.net(), 70.0);

        assert!(store.summarize("u1", 2026, 13).is_err());
    }

    #[test]
    fn mutations_notify_the_change_feed() {
        let store = store();
        let rx = store.feed().subscribe();

        let row = store.add(new_tx("u1", 10.0)).unwrap();
        store.delete(row.id, "u1").unwrap();

        let first = rx.recv().unwrap();
        assert_eq!(first.kind, tally_core::ChangeKind::Inserted);
        let second = rx.recv().unwrap();
        assert_eq!(second.kind, tally_core::ChangeKind::Tombstoned);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let id = {
            let store = LocalStore::open(&path).unwrap();
            store.add(new_tx("u1", 10.0)).unwrap().id
        };

        let store = LocalStore::open(&path).unwrap();
        assert!(store.get(id).unwrap().is_some());
    }
}
