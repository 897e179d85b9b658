//! Error types for the local store.

use tally_core::CoreError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Domain-level rejection (tombstoned edit, not found, bad codes).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// A year/month pair that does not form a valid calendar month.
    #[error("invalid month: {year}-{month}")]
    InvalidMonth {
        /// Year component.
        year: i32,
        /// Month component (1-12).
        month: u32,
    },
}

impl StoreError {
    /// Returns true if this is the tombstoned-edit domain rejection.
    pub fn is_tombstoned_edit(&self) -> bool {
        matches!(self, StoreError::Domain(CoreError::TombstonedEdit { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn domain_passthrough_display() {
        let err: StoreError = CoreError::TombstonedEdit { id: Uuid::nil() }.into();
        assert!(err.is_tombstoned_edit());
        assert!(err.to_string().contains("deleted"));
    }
}
