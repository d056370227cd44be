//! # Store Error Types
//!
//! Error taxonomy for the durable local store.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Error Propagation                             │
//! │                                                                     │
//! │  SQLite error (sqlx::Error)                                         │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  StoreError (this module) ← categorized: constraint vs I/O          │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  Service layer (nadi-pos) ← typed failures, never raw strings       │
//! │                                                                     │
//! │  ConstraintViolation → rolled back, surfaced to the caller          │
//! │  Io                  → fatal for the operation, no partial writes   │
//! │  DuplicateCommit     → absorbed by the checkout writer (safe retry) │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Durable local store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found in the store.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A database constraint rejected the write (CHECK, UNIQUE, foreign
    /// key). The enclosing transaction has been rolled back.
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// The same sale id was committed before. Retrying checkout after a
    /// crash lands here; callers treat it as success, not failure.
    #[error("Transaction {transaction_id} was already committed")]
    DuplicateCommit { transaction_id: String },

    /// Storage-level fault (disk unavailable, corrupt file, pool closed).
    /// No partial writes survive.
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// Could not open or connect to the database.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Schema initialization/upgrade failed.
    #[error("Schema setup failed: {0}")]
    Schema(String),
}

impl StoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound   → StoreError::NotFound
/// sqlx::Error::Database      → inspect message for constraint class
/// sqlx::Error::PoolTimedOut  → StoreError::Connection
/// sqlx::Error::Io            → StoreError::Io
/// other                      → StoreError::Io
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();

                // SQLite reports all constraint classes in the message:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                // "CHECK constraint failed: <table>"
                if msg.contains("constraint failed") {
                    StoreError::ConstraintViolation { message: msg }
                } else {
                    StoreError::Io(msg)
                }
            }

            sqlx::Error::PoolTimedOut => {
                StoreError::Connection("Connection pool exhausted".to_string())
            }

            sqlx::Error::PoolClosed => StoreError::Connection("Pool is closed".to_string()),

            sqlx::Error::Io(io) => StoreError::Io(io.to_string()),

            other => StoreError::Io(other.to_string()),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = StoreError::not_found("Product", "p-1");
        assert_eq!(err.to_string(), "Product not found: p-1");
    }

    #[test]
    fn test_duplicate_commit_message() {
        let err = StoreError::DuplicateCommit {
            transaction_id: "tx-9".into(),
        };
        assert!(err.to_string().contains("tx-9"));
    }
}
