//! # Database Error Types
//!
//! Error types for storage operations.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Taxonomy                                       │
//! │                                                                         │
//! │  PolicyViolation   → InsufficientStock                                 │
//! │    Recoverable, user-facing. Carries requested vs. available so the    │
//! │    UI can offer a reduced-quantity retry.                              │
//! │                                                                         │
//! │  ValidationError   → Validation (from almacen-core)                    │
//! │    Malformed input, rejected before any transaction opens.             │
//! │                                                                         │
//! │  PersistenceError  → everything else                                   │
//! │    Storage-layer failure. Always aborts the whole transaction;         │
//! │    never partially applied; no automatic retry.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use almacen_core::ValidationError;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A sale line requested more than the effective stock while the policy
    /// disallows negative stock.
    ///
    /// ## Recovery
    /// Recoverable: the caller should surface requested vs. available and let
    /// the user reduce the quantity or cancel. Under concurrent load the
    /// condition may be transient (retry with a fresh stock read).
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: i64,
        requested: i64,
        available: i64,
    },

    /// Malformed input rejected before any write.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Entity not found in the database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: i64 },

    /// Unique constraint violation (duplicate barcode, national ID, username).
    #[error("Duplicate {field}: already exists")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: i64) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id,
        }
    }

    /// True for the recoverable policy violation; everything else is either
    /// bad input or a fatal persistence failure.
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, StoreError::InsufficientStock { .. })
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → StoreError::PoolExhausted
/// Other                       → StoreError::Internal
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    StoreError::UniqueViolation { field }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    StoreError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    StoreError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,

            sqlx::Error::PoolClosed => StoreError::ConnectionFailed("Pool is closed".to_string()),

            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = StoreError::InsufficientStock {
            product_id: 7,
            requested: 25,
            available: 20,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product 7: requested 25, available 20"
        );
        assert!(err.is_policy_violation());
    }

    #[test]
    fn test_validation_is_not_policy_violation() {
        let err: StoreError = ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        }
        .into();
        assert!(!err.is_policy_violation());
    }
}
