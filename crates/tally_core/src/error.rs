//! Domain errors.

use thiserror::Error;
use uuid::Uuid;

/// Result type for domain operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by domain-level validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An edit was attempted on a tombstoned transaction.
    #[error("cannot edit a deleted transaction: {id}")]
    TombstonedEdit {
        /// Id of the tombstoned transaction.
        id: Uuid,
    },

    /// The referenced transaction does not exist locally.
    #[error("transaction not found: {id}")]
    NotFound {
        /// Id that was looked up.
        id: Uuid,
    },

    /// A transaction kind string was not `income` or `expense`.
    #[error("invalid transaction kind: {value}")]
    InvalidKind {
        /// The rejected value.
        value: String,
    },

    /// A sync status code outside the closed 0/1/2 set was read.
    #[error("invalid sync status code: {code}")]
    InvalidStatusCode {
        /// The rejected code.
        code: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let id = Uuid::nil();
        let err = CoreError::TombstonedEdit { id };
        assert!(err.to_string().contains("deleted"));

        let err = CoreError::InvalidStatusCode { code: 7 };
        assert!(err.to_string().contains('7'));
    }
}
