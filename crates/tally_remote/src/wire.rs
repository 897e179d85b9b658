//! Wire types for the statement-over-HTTP contract.
//!
//! A request is a batch of parameterized statements; a response carries
//! one result per statement, each either a list of row objects or a
//! statement-level error message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One result row, as returned by the remote store.
pub type Row = serde_json::Map<String, Value>;

/// A single parameterized statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    /// SQL text with `?`-style placeholders.
    pub sql: String,
    /// Positional arguments.
    pub args: Vec<Value>,
}

impl Statement {
    /// Creates a statement.
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// A batch of statements submitted in one HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementBatch {
    /// Statements, executed in order.
    pub statements: Vec<Statement>,
}

impl StatementBatch {
    /// Wraps a single statement.
    pub fn single(statement: Statement) -> Self {
        Self {
            statements: vec![statement],
        }
    }
}

/// Result of one statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementResult {
    /// Returned rows (empty for statements that return nothing).
    #[serde(default)]
    pub rows: Vec<Row>,
    /// Statement-level error, if execution failed server-side.
    #[serde(default)]
    pub error: Option<String>,
}

impl StatementResult {
    /// A successful result carrying the given rows.
    pub fn ok(rows: Vec<Row>) -> Self {
        Self { rows, error: None }
    }

    /// A failed result carrying an error message.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            rows: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// The full response to a statement batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// One result per submitted statement, in order.
    pub results: Vec<StatementResult>,
}

impl QueryResponse {
    /// Wraps a single statement result.
    pub fn single(result: StatementResult) -> Self {
        Self {
            results: vec![result],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_shape() {
        let batch = StatementBatch::single(Statement::new(
            "SELECT * FROM transactions WHERE user_id = ?",
            vec![json!("u1")],
        ));
        let encoded = serde_json::to_value(&batch).unwrap();
        assert_eq!(encoded["statements"][0]["args"][0], json!("u1"));
    }

    #[test]
    fn response_defaults() {
        let decoded: QueryResponse =
            serde_json::from_str(r#"{"results":[{}]}"#).unwrap();
        assert_eq!(decoded.results.len(), 1);
        assert!(decoded.results[0].rows.is_empty());
        assert!(decoded.results[0].error.is_none());
    }

    #[test]
    fn response_roundtrip() {
        let mut row = Row::new();
        row.insert("id".to_string(), json!("t1"));
        let response = QueryResponse::single(StatementResult::ok(vec![row]));

        let text = serde_json::to_string(&response).unwrap();
        let decoded: QueryResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded.results[0].rows[0]["id"], json!("t1"));
    }
}
