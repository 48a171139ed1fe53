//! # Database Error Types
//!
//! Error types for database operations and ledger services.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Business rule (CoreError)         │
//! │       │                                    │                            │
//! │       ▼                                    │                            │
//! │  DbError (this module)                     │                            │
//! │  ├── SQLITE_BUSY ──► Contention            │                            │
//! │  └── constraint  ──► UniqueViolation ...   │                            │
//! │       │                                    │                            │
//! │       └──────────────┬─────────────────────┘                            │
//! │                      ▼                                                  │
//! │                LedgerError ← what ledger callers match on               │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │     caller maps to a form/flash message, retries only if retryable     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use apoteca_core::{CoreError, ValidationError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (duplicate barcode, lot code).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. negative stock reached the table).
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// The ledger lock could not be acquired within the configured wait.
    ///
    /// ## When This Occurs
    /// Another transaction held the write lock longer than
    /// `DbConfig::lock_timeout`. Nothing from the failed attempt was
    /// persisted; retrying the whole operation is safe.
    #[error("Lock contention: {0}")]
    Contention(String),

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

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether the failed operation can be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Contention(_) | DbError::PoolExhausted)
    }
}

/// SQLite primary result code for SQLITE_BUSY; extended codes share the low byte.
const SQLITE_BUSY: i32 = 5;

fn is_busy(code: Option<&str>, message: &str) -> bool {
    let busy_code = code
        .and_then(|c| c.parse::<i32>().ok())
        .map(|c| c & 0xff == SQLITE_BUSY)
        .unwrap_or(false);
    busy_code || message.contains("database is locked")
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → busy / constraint analysis
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                let code = db_err.code().map(|c| c.into_owned());

                if is_busy(code.as_deref(), &msg) {
                    DbError::Contention(msg)
                } else if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation { message: msg }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation { message: msg }
                } else {
                    DbError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Ledger Error
// =============================================================================

/// Errors returned by ledger operations: either a business rule failed or
/// storage did.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl LedgerError {
    /// True only for lock contention; business failures are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Db(err) => err.is_retryable(),
            LedgerError::Core(_) => false,
        }
    }

    /// The wrapped business error, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            LedgerError::Core(err) => Some(err),
            LedgerError::Db(_) => None,
        }
    }

    /// Units missing, when this is an insufficient-stock failure.
    pub fn shortfall(&self) -> Option<i64> {
        self.as_core().and_then(CoreError::shortfall)
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Db(err.into())
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(err.into())
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_detection() {
        assert!(is_busy(Some("5"), "whatever"));
        // SQLITE_BUSY_SNAPSHOT (517) is a busy variant
        assert!(is_busy(Some("517"), "whatever"));
        assert!(is_busy(None, "database is locked"));
        assert!(!is_busy(Some("19"), "UNIQUE constraint failed: lots.lot_code"));
    }

    #[test]
    fn test_retryable() {
        assert!(LedgerError::from(DbError::Contention("busy".into())).is_retryable());
        assert!(!LedgerError::from(DbError::not_found("Lot", "x")).is_retryable());
        assert!(!LedgerError::from(CoreError::EmptyCart).is_retryable());
    }

    #[test]
    fn test_shortfall_passthrough() {
        let err = LedgerError::from(CoreError::InsufficientStock {
            product_id: "p".into(),
            available: 40,
            requested: 60,
        });
        assert_eq!(err.shortfall(), Some(20));
    }
}
