//! Common error types for the admission service

use thiserror::Error;

/// Common result type for admission operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the admission crates
///
/// Duplicate deliveries and repeated scans are NOT errors; they are reported
/// through outcome enums by the issuance and check-in engines.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payment notification or ticket request has a malformed shape
    #[error("Validation failure: {0}")]
    Validation(String),

    /// QR token failed authentication or could not be parsed
    #[error("Invalid token")]
    InvalidToken,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the underlying store rejected a write on a UNIQUE or PRIMARY KEY constraint
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}
