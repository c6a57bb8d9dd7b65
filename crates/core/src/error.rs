//! Error types for the tributary engine.

use crate::row::RowKey;
use alloc::string::String;
use core::fmt;

/// Result type alias for tributary operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error taxonomy of the engine.
///
/// The first group are construction-time schema errors; the second are
/// source-level contract violations raised from `push` and guaranteed to
/// leave source state unchanged; the last are internal protocol breaches
/// that indicate a bug in the caller or in an operator.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Invalid schema or pipeline definition.
    InvalidSchema {
        message: String,
    },
    /// Column not found in a source schema.
    ColumnNotFound {
        table: String,
        column: String,
    },
    /// An added row's primary key is already present.
    DuplicatePrimaryKey {
        table: String,
        key: RowKey,
    },
    /// A removed or edited row was not found (or did not deep-equal the
    /// stored row).
    NotFound {
        table: String,
        key: RowKey,
    },
    /// An edit claimed to preserve the primary key but did not.
    PrimaryKeyMismatch {
        table: String,
        old: RowKey,
        new: RowKey,
    },
    /// A pushed row violates a declared column constraint.
    ConstraintViolation {
        message: String,
    },
    /// Internal assertion failure; indicates a bug upstream.
    InvariantViolation {
        message: String,
    },
    /// A push arrived while a fetch cursor was still outstanding.
    OutOfOrder {
        message: String,
    },
    /// A lazy sequence was abandoned, or fetched again while still live.
    SequenceAbandoned {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidSchema { message } => {
                write!(f, "invalid schema: {}", message)
            }
            Error::ColumnNotFound { table, column } => {
                write!(f, "column {} not found in table {}", column, table)
            }
            Error::DuplicatePrimaryKey { table, key } => {
                write!(f, "duplicate primary key in table {}: {:?}", table, key)
            }
            Error::NotFound { table, key } => {
                write!(f, "row not found in table {}: {:?}", table, key)
            }
            Error::PrimaryKeyMismatch { table, old, new } => {
                write!(
                    f,
                    "edit changed primary key in table {}: {:?} -> {:?}",
                    table, old, new
                )
            }
            Error::ConstraintViolation { message } => {
                write!(f, "constraint violation: {}", message)
            }
            Error::InvariantViolation { message } => {
                write!(f, "invariant violation: {}", message)
            }
            Error::OutOfOrder { message } => {
                write!(f, "out-of-order operation: {}", message)
            }
            Error::SequenceAbandoned { message } => {
                write!(f, "lazy sequence abandoned: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a column not found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates a duplicate primary key error.
    pub fn duplicate_primary_key(table: impl Into<String>, key: RowKey) -> Self {
        Error::DuplicatePrimaryKey {
            table: table.into(),
            key,
        }
    }

    /// Creates a not found error.
    pub fn not_found(table: impl Into<String>, key: RowKey) -> Self {
        Error::NotFound {
            table: table.into(),
            key,
        }
    }

    /// Creates a primary key mismatch error.
    pub fn primary_key_mismatch(table: impl Into<String>, old: RowKey, new: RowKey) -> Self {
        Error::PrimaryKeyMismatch {
            table: table.into(),
            old,
            new,
        }
    }

    /// Creates a constraint violation error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Error::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Creates an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Error::InvariantViolation {
            message: message.into(),
        }
    }

    /// Creates an out-of-order error.
    pub fn out_of_order(message: impl Into<String>) -> Self {
        Error::OutOfOrder {
            message: message.into(),
        }
    }

    /// Creates a sequence abandoned error.
    pub fn abandoned(message: impl Into<String>) -> Self {
        Error::SequenceAbandoned {
            message: message.into(),
        }
    }
}
