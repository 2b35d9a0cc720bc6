//! Unified error types for the ledger.
//!
//! Every fallible operation in the crate returns [`Result`]. Validation errors are
//! produced before any database transaction starts; storage errors carry the
//! underlying `SeaORM` error as their source.

use rust_decimal::Decimal;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// An input field failed validation (empty name, unknown role, ...)
    #[error("Validation error: {message}")]
    Validation {
        /// What went wrong
        message: String,
    },

    /// Amount is non-positive, malformed, or has more than two fractional digits
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount as supplied
        amount: String,
    },

    /// No member exists with the given id
    #[error("Member not found: {member_id}")]
    MemberNotFound {
        /// The id that was looked up
        member_id: String,
    },

    /// No employee exists with the given id
    #[error("Employee not found: {employee_id}")]
    EmployeeNotFound {
        /// The id that was looked up
        employee_id: String,
    },

    /// A consume would take the balance below zero
    #[error("Insufficient balance: current {current}, required {required}")]
    InsufficientBalance {
        /// Balance at the time of the check
        current: Decimal,
        /// Amount that was requested
        required: Decimal,
    },

    /// A snapshot file is corrupt, unversioned, or violates ledger invariants
    #[error("Invalid snapshot format: {message}")]
    InvalidFormat {
        /// What went wrong
        message: String,
    },

    /// The backup directory holds no snapshot files
    #[error("No backup available in {dir}")]
    NoBackupAvailable {
        /// Directory that was scanned
        dir: String,
    },

    /// An entity with the same identity already exists
    #[error("Duplicate {entity}: {key}")]
    DuplicateKey {
        /// Which identity collided (`member`, `employee phone`, ...)
        entity: &'static str,
        /// The colliding value
        key: String,
    },

    /// Phone/password pair did not authenticate an active employee
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Password hashing failed
    #[error("Password hashing failed: {message}")]
    PasswordHash {
        /// Message from the hasher
        message: String,
    },

    /// Underlying database or transaction failure
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] DbErr),

    /// Backup directory I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot serialization failure
    #[error("Snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Stable machine-readable classification of an [`Error`].
///
/// Outer layers (HTTP handlers, CLIs) map these to status codes without
/// matching on variant payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration
    Config,
    /// Bad input
    Validation,
    /// Bad amount
    InvalidAmount,
    /// Unknown member
    MemberNotFound,
    /// Unknown employee
    EmployeeNotFound,
    /// Not enough funds
    InsufficientBalance,
    /// Corrupt snapshot
    InvalidFormat,
    /// Nothing to restore
    NoBackupAvailable,
    /// Identity collision
    DuplicateKey,
    /// Authentication failed
    InvalidCredentials,
    /// Database, filesystem or encoding failure
    StorageFailure,
}

impl ErrorKind {
    /// Upper-camel code used in API responses
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "Config",
            Self::Validation => "Validation",
            Self::InvalidAmount => "InvalidAmount",
            Self::MemberNotFound => "MemberNotFound",
            Self::EmployeeNotFound => "EmployeeNotFound",
            Self::InsufficientBalance => "InsufficientBalance",
            Self::InvalidFormat => "InvalidFormat",
            Self::NoBackupAvailable => "NoBackupAvailable",
            Self::DuplicateKey => "DuplicateKey",
            Self::InvalidCredentials => "InvalidCredentials",
            Self::StorageFailure => "StorageFailure",
        }
    }
}

impl Error {
    /// Classifies the error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            Self::MemberNotFound { .. } => ErrorKind::MemberNotFound,
            Self::EmployeeNotFound { .. } => ErrorKind::EmployeeNotFound,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            Self::NoBackupAvailable { .. } => ErrorKind::NoBackupAvailable,
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::PasswordHash { .. }
            | Self::StorageFailure(_)
            | Self::Io(_)
            | Self::Encode(_) => ErrorKind::StorageFailure,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Maps a unique-constraint violation on insert/update to [`Error::DuplicateKey`]
    pub(crate) fn from_write(err: DbErr, entity: &'static str, key: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Self::DuplicateKey {
                entity,
                key: key.to_string(),
            },
            _ => Self::StorageFailure(err),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
