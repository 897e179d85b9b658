//! The transaction record and its sync metadata.

use crate::error::CoreError;
use crate::time::now_millis;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
}

impl TransactionKind {
    /// Returns the storage/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(CoreError::InvalidKind {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-row synchronization state.
///
/// `Tombstoned` is terminal: no write path, local or remote, transitions a
/// row out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Local mutation not yet acknowledged by the remote store.
    Pending,
    /// Row matches the last acknowledged remote state.
    Synced,
    /// Row is deleted; retained as a permanent marker.
    Tombstoned,
}

impl SyncStatus {
    /// Converts to the storage code (0/1/2).
    pub fn to_code(&self) -> i64 {
        match self {
            SyncStatus::Pending => 0,
            SyncStatus::Synced => 1,
            SyncStatus::Tombstoned => 2,
        }
    }

    /// Converts from the storage code.
    pub fn from_code(code: i64) -> Result<Self, CoreError> {
        match code {
            0 => Ok(SyncStatus::Pending),
            1 => Ok(SyncStatus::Synced),
            2 => Ok(SyncStatus::Tombstoned),
            other => Err(CoreError::InvalidStatusCode { code: other }),
        }
    }
}

/// A financial transaction, the unit of synchronization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Stable client-generated id. Immutable.
    pub id: Uuid,
    /// Owning user.
    pub user_id: String,
    /// Originating-device marker, if known.
    pub client_id: Option<String>,
    /// Income or expense.
    pub kind: TransactionKind,
    /// Signed-less amount; direction is carried by `kind`.
    pub amount: f64,
    /// User-facing category label.
    pub category: String,
    /// Free-form note.
    pub note: Option<String>,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Calendar date the transaction applies to.
    pub date: NaiveDate,
    /// Monotonically increasing version assigned by the remote store.
    /// Zero until the first acknowledged push.
    pub server_version: i64,
    /// Current sync state.
    pub sync_status: SyncStatus,
    /// True while a local mutation is unacknowledged.
    pub need_sync: bool,
    /// Creation time, epoch milliseconds. Immutable.
    pub created_at: i64,
    /// Last mutation time, epoch milliseconds.
    pub updated_at: i64,
    /// Deletion marker, epoch milliseconds. Write-once.
    pub deleted_at: Option<i64>,
}

impl Transaction {
    /// Returns true if this row is a tombstone.
    pub fn is_tombstoned(&self) -> bool {
        matches!(self.sync_status, SyncStatus::Tombstoned)
    }

    /// Returns true if the row carries a delete marker.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Fields for creating a transaction locally.
///
/// The id may be supplied by the caller (for deterministic tests and
/// imports) or left out to generate a fresh v4 UUID.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Optional caller-supplied id.
    pub id: Option<Uuid>,
    /// Owning user.
    pub user_id: String,
    /// Originating-device marker.
    pub client_id: Option<String>,
    /// Income or expense.
    pub kind: TransactionKind,
    /// Amount.
    pub amount: f64,
    /// Category label.
    pub category: String,
    /// Free-form note.
    pub note: Option<String>,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Calendar date.
    pub date: NaiveDate,
}

impl NewTransaction {
    /// Creates a minimal new-transaction value.
    pub fn new(
        user_id: impl Into<String>,
        kind: TransactionKind,
        amount: f64,
        category: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            client_id: None,
            kind,
            amount,
            category: category.into(),
            note: None,
            currency: "USD".to_string(),
            date,
        }
    }

    /// Sets an explicit id.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the originating-device marker.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Sets the currency code.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Materializes the full row for insertion: fresh id if none supplied,
    /// `Pending` status, `need_sync` set, `server_version` zero.
    pub fn into_transaction(self) -> Transaction {
        let now = now_millis();
        Transaction {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            user_id: self.user_id,
            client_id: self.client_id,
            kind: self.kind,
            amount: self.amount,
            category: self.category,
            note: self.note,
            currency: self.currency,
            date: self.date,
            server_version: 0,
            sync_status: SyncStatus::Pending,
            need_sync: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// A partial update to an existing transaction.
///
/// Absent fields are left untouched; present fields overwrite.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    /// New kind.
    pub kind: Option<TransactionKind>,
    /// New amount.
    pub amount: Option<f64>,
    /// New category.
    pub category: Option<String>,
    /// New note.
    pub note: Option<String>,
    /// New currency code.
    pub currency: Option<String>,
    /// New date.
    pub date: Option<NaiveDate>,
}

impl TransactionPatch {
    /// Returns true if no field is present.
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.note.is_none()
            && self.currency.is_none()
            && self.date.is_none()
    }

    /// Merges the present fields over an existing row.
    pub fn apply_to(&self, row: &mut Transaction) {
        if let Some(kind) = self.kind {
            row.kind = kind;
        }
        if let Some(amount) = self.amount {
            row.amount = amount;
        }
        if let Some(category) = &self.category {
            row.category = category.clone();
        }
        if let Some(note) = &self.note {
            row.note = Some(note.clone());
        }
        if let Some(currency) = &self.currency {
            row.currency = currency.clone();
        }
        if let Some(date) = self.date {
            row.date = date;
        }
    }
}
