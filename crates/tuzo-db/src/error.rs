//! # Storage and Ledger Error Types
//!
//! Error types for database and ledger operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Rule failure (tuzo_core::CoreError) │
//! │       │                                   │                             │
//! │       ▼                                   │                             │
//! │  DbError ← constraint + fault category    │                             │
//! │       │                                   │                             │
//! │       └──────────────┬────────────────────┘                             │
//! │                      ▼                                                  │
//! │  LedgerError ── kind() ──► ErrorKind (stable, caller-facing)           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (in tuzo-api) ← HTTP status + JSON body                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;
use tuzo_core::{CoreError, ValidationError};

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and retry decisions.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - Unknown business or customer id
    /// - Customer belongs to a different business than the request
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate phone number within a business
    /// - Referral code collision
    /// - Second referral for the same customer
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation.
    ///
    /// ## When This Occurs
    /// - A write would make a point balance or counter negative
    #[error("Check constraint failed: {message}")]
    CheckViolation { message: String },

    /// Database is locked by another writer.
    ///
    /// ## When This Occurs
    /// - Two transactions upgrade to a write lock at the same time
    /// - busy_timeout elapsed while waiting for a lock
    #[error("Database busy: {0}")]
    Busy(String),

    /// Operation did not finish within its deadline.
    #[error("Operation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Pool closed during shutdown
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

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True if this is a UNIQUE violation on `table.column`.
    pub fn is_unique_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(column))
    }

    /// True if retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. }
                | DbError::Busy(_)
                | DbError::Timeout { .. }
                | DbError::ConnectionFailed(_)
                | DbError::PoolExhausted
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io             → DbError::ConnectionFailed
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
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE: "UNIQUE constraint failed: <table>.<column>[, ...]"
                // FK:     "FOREIGN KEY constraint failed"
                // CHECK:  "CHECK constraint failed: <expr>"
                if msg.contains("UNIQUE constraint failed") {
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
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked") || msg.contains("database table is locked")
                {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

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
// Ledger Errors
// =============================================================================

/// Caller-facing error category.
///
/// Every failure of a ledger or directory operation maps to exactly one
/// kind. The API layer chooses HTTP status codes from this alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Amount was non-positive, non-finite or too large.
    InvalidAmount,
    /// Any other malformed input.
    Invalid,
    /// Business or customer does not exist.
    NotFound,
    /// Referral code is unknown or unusable here.
    InvalidCode,
    /// A customer tried to redeem their own code.
    SelfReferral,
    /// The customer has already been referred.
    AlreadyReferred,
    /// A uniqueness rule rejected the write.
    Conflict,
    /// Deadline elapsed.
    Timeout,
    /// Storage temporarily unavailable.
    Unavailable,
    /// Anything else.
    Internal,
}

/// Errors returned by ledger and directory operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A domain rule rejected the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failed or rejected the write.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Db(DbError::from(err))
    }
}

impl LedgerError {
    /// Stable category for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Core(err) => match err {
                CoreError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
                CoreError::InvalidRate { .. } | CoreError::Validation(_) => ErrorKind::Invalid,
                CoreError::InvalidCode { .. } => ErrorKind::InvalidCode,
                CoreError::SelfReferral { .. } => ErrorKind::SelfReferral,
                CoreError::AlreadyReferred { .. } => ErrorKind::AlreadyReferred,
            },
            LedgerError::Db(err) => match err {
                DbError::NotFound { .. } => ErrorKind::NotFound,
                DbError::UniqueViolation { .. } => ErrorKind::Conflict,
                DbError::ForeignKeyViolation { .. } => ErrorKind::NotFound,
                DbError::CheckViolation { .. } => ErrorKind::Invalid,
                DbError::Timeout { .. } => ErrorKind::Timeout,
                DbError::Busy(_) | DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                    ErrorKind::Unavailable
                }
                DbError::MigrationFailed(_) | DbError::QueryFailed(_) | DbError::Internal(_) => {
                    ErrorKind::Internal
                }
            },
        }
    }

    /// True if the ledger may retry the whole operation.
    ///
    /// Rule failures are terminal: a retry would hit the same rule.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Core(_) => false,
            LedgerError::Db(err) => err.is_retryable(),
        }
    }

    /// True if the transaction may have committed before this error surfaced.
    ///
    /// Only a deadline can fire between COMMIT reaching SQLite and its reply.
    pub fn may_have_committed(&self) -> bool {
        matches!(self, LedgerError::Db(DbError::Timeout { .. }))
    }
}

/// Result type for ledger and directory operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================
