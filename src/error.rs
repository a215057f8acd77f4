use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Server error number raised by `RAISERROR` without a message id.
pub const STORED_PROCEDURE_ERROR: u32 = 50000;
/// Foreign key (and check) constraint violation.
pub const FOREIGN_KEY_ERROR: u32 = 547;
/// Violation of a `PRIMARY KEY` constraint.
pub const PRIMARY_KEY_ERROR: u32 = 2627;
/// Duplicate key row in a unique index.
pub const DUPLICATE_KEY_ERROR: u32 = 2601;

const EXECUTION_ERROR_CLASS: u8 = 16;

static CONSTRAINT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "({FOREIGN_KEY_ERROR}|{DUPLICATE_KEY_ERROR}|{PRIMARY_KEY_ERROR})"
    ))
    .unwrap_or_else(|e| panic!("invalid constraint regex: {e}"))
});

/// Which integrity rule a statement broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    ForeignKey,
    PrimaryKey,
    DuplicateKey,
}

impl ConstraintKind {
    /// Map a server error number to a constraint kind.
    #[must_use]
    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            FOREIGN_KEY_ERROR => Some(Self::ForeignKey),
            PRIMARY_KEY_ERROR => Some(Self::PrimaryKey),
            DUPLICATE_KEY_ERROR => Some(Self::DuplicateKey),
            _ => None,
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignKey => f.write_str("foreign key"),
            Self::PrimaryKey => f.write_str("primary key"),
            Self::DuplicateKey => f.write_str("duplicate key"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SqlServerError {
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Command error: {0}")]
    CommandError(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Value of '{0}' is NULL")]
    NullValue(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("No current row: call read() before accessing column values")]
    NoCurrentRow,

    #[error("Too many parameters: {count} bound values exceed the server limit of {limit}")]
    TooManyParameters { count: usize, limit: usize },

    #[error("Constraint violation ({kind}, error {number}): {message}")]
    Constraint {
        kind: ConstraintKind,
        number: u32,
        message: String,
    },

    #[error("Stored procedure error: {0}")]
    Custom(String),

    #[error("SQL execution error {number}: {message}")]
    Execution { number: u32, message: String },

    #[error("Transaction error: {0}")]
    TransactionError(String),
}

impl SqlServerError {
    /// Check whether the error is a constraint violation of the given kind.
    #[must_use]
    pub fn is_constraint(&self, kind: ConstraintKind) -> bool {
        matches!(self, Self::Constraint { kind: k, .. } if *k == kind)
    }

    /// Copy of a deferred builder error, so it keeps surfacing until the
    /// command is reset.
    pub(crate) fn replay(&self) -> Self {
        match self {
            Self::ParameterError(msg) => Self::ParameterError(msg.clone()),
            Self::CommandError(msg) => Self::CommandError(msg.clone()),
            Self::TypeMismatch { expected, found } => Self::type_mismatch(expected, found),
            other => Self::CommandError(other.to_string()),
        }
    }

    pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, SqlServerError>;

/// Translate a driver error raised while executing a command.
///
/// Server errors are classified by number and class: `RAISERROR` from a
/// procedure (50000) is unwrapped into the constraint error its message
/// names, constraint numbers map to [`SqlServerError::Constraint`], and other
/// class 16 errors become [`SqlServerError::Execution`]. Everything else is
/// passed through untouched.
#[must_use]
pub fn handle_exception(err: tiberius::error::Error) -> SqlServerError {
    if let tiberius::error::Error::Server(token) = &err {
        if let Some(mapped) = classify_server_error(token.code(), token.class(), token.message()) {
            return mapped;
        }
    }
    SqlServerError::MssqlError(err)
}

pub(crate) fn classify_server_error(
    number: u32,
    class: u8,
    message: &str,
) -> Option<SqlServerError> {
    if number == STORED_PROCEDURE_ERROR {
        let raised = CONSTRAINT_NUMBER
            .find(message)
            .and_then(|m| m.as_str().parse::<u32>().ok());
        return Some(match raised.and_then(|n| ConstraintKind::from_number(n).map(|k| (n, k))) {
            Some((number, kind)) => SqlServerError::Constraint {
                kind,
                number,
                message: message.to_string(),
            },
            None => SqlServerError::Custom(message.to_string()),
        });
    }

    if let Some(kind) = ConstraintKind::from_number(number) {
        return Some(SqlServerError::Constraint {
            kind,
            number,
            message: message.to_string(),
        });
    }

    if class == EXECUTION_ERROR_CLASS {
        return Some(SqlServerError::Execution {
            number,
            message: message.to_string(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_numbers_map_to_kinds() {
        let err = classify_server_error(547, 16, "The INSERT statement conflicted").unwrap();
        assert!(err.is_constraint(ConstraintKind::ForeignKey));

        let err = classify_server_error(2627, 14, "Violation of PRIMARY KEY").unwrap();
        assert!(err.is_constraint(ConstraintKind::PrimaryKey));

        let err = classify_server_error(2601, 14, "Cannot insert duplicate key row").unwrap();
        assert!(err.is_constraint(ConstraintKind::DuplicateKey));
    }

    #[test]
    fn raiserror_with_constraint_number_is_unwrapped() {
        let err = classify_server_error(50000, 16, "Error 2627 in uspInsertDepartment").unwrap();
        match err {
            SqlServerError::Constraint { kind, number, .. } => {
                assert_eq!(kind, ConstraintKind::PrimaryKey);
                assert_eq!(number, 2627);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn raiserror_without_constraint_number_is_custom() {
        let err = classify_server_error(50000, 16, "Department is locked").unwrap();
        assert!(matches!(err, SqlServerError::Custom(msg) if msg == "Department is locked"));
    }

    #[test]
    fn class_16_becomes_execution_error() {
        let err = classify_server_error(208, 16, "Invalid object name 'Nope'.").unwrap();
        assert!(matches!(err, SqlServerError::Execution { number: 208, .. }));
    }

    #[test]
    fn other_errors_pass_through() {
        assert!(classify_server_error(1205, 13, "deadlock victim").is_none());
    }
}
