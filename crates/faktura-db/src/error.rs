//! Database errors

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// Stored row could not be decoded into a domain value
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Database result type
pub type DbResult<T> = Result<T, DbError>;
