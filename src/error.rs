//! Error types for zero-pgwire.

use thiserror::Error;

/// Result type for zero-pgwire operations.
pub type Result<T> = core::result::Result<T, Error>;

/// SQLSTATE codes reported by the command layer.
pub mod sqlstate {
    /// successful_completion
    pub const SUCCESSFUL_COMPLETION: &str = "00000";
    /// protocol_violation
    pub const PROTOCOL_VIOLATION: &str = "08P01";
    /// in_failed_sql_transaction
    pub const IN_FAILED_SQL_TRANSACTION: &str = "25P02";
    /// invalid_sql_statement_name
    pub const INVALID_SQL_STATEMENT_NAME: &str = "26000";
    /// invalid_cursor_name
    pub const INVALID_CURSOR_NAME: &str = "34000";
    /// duplicate_prepared_statement
    pub const DUPLICATE_PREPARED_STATEMENT: &str = "42P05";
    /// too_many_columns
    pub const TOO_MANY_COLUMNS: &str = "54011";
    /// internal_error
    pub const INTERNAL_ERROR: &str = "XX000";
}

/// Severity of an ErrorResponse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The current command failed; the connection stays usable.
    Error,
    /// The connection is about to be closed.
    Fatal,
}

impl Severity {
    /// The non-localized wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

/// PostgreSQL error/notice fields.
///
/// Backends report execution failures with this type, and the command layer
/// renders its own errors into it before writing an ErrorResponse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorFields {
    /// Severity: ERROR, FATAL, PANIC, WARNING, NOTICE, DEBUG, INFO, LOG
    pub severity: Option<String>,
    /// Non-localized severity (same as severity but never translated)
    pub severity_non_localized: Option<String>,
    /// SQLSTATE error code (5 characters)
    pub code: Option<String>,
    /// Primary error message
    pub message: Option<String>,
    /// Detailed error explanation
    pub detail: Option<String>,
    /// Suggestion for fixing the error
    pub hint: Option<String>,
    /// Cursor position in query string (1-based)
    pub position: Option<u32>,
    /// Context/stack trace
    pub where_: Option<String>,
    /// Schema name
    pub schema: Option<String>,
    /// Table name
    pub table: Option<String>,
    /// Column name
    pub column: Option<String>,
    /// Data type name
    pub data_type: Option<String>,
    /// Constraint name
    pub constraint: Option<String>,
}

impl ErrorFields {
    /// Create fields with the given severity, SQLSTATE and message.
    pub fn new(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Some(severity.as_str().to_string()),
            severity_non_localized: Some(severity.as_str().to_string()),
            code: Some(code.to_string()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Create ERROR-severity fields.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Attach a detail line.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach a hint line.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl std::fmt::Display for ErrorFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(severity) = &self.severity {
            write!(f, "{}: ", severity)?;
        }
        if let Some(message) = &self.message {
            write!(f, "{}", message)?;
        }
        if let Some(code) = &self.code {
            write!(f, " (SQLSTATE {})", code)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {}", detail)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {}", hint)?;
        }
        Ok(())
    }
}

/// Error type for zero-pgwire.
#[derive(Debug, Error)]
pub enum Error {
    /// A read ran past the declared message bounds, or the frame itself is malformed.
    ///
    /// Byte alignment with the client is lost, so this is always fatal.
    #[error("Framing error: {0}")]
    Framing(String),

    /// Message invalid for its position in the protocol lifecycle.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Named prepared statement is not registered
    #[error("prepared statement \"{0}\" does not exist")]
    UndefinedStatement(String),

    /// Named portal is not registered
    #[error("portal \"{0}\" does not exist")]
    UndefinedPortal(String),

    /// Parse tried to redefine a named prepared statement
    #[error("prepared statement \"{0}\" already exists")]
    DuplicateStatement(String),

    /// Command issued inside an aborted transaction block
    #[error("current transaction is aborted, commands ignored until end of transaction block")]
    InFailedTransaction,

    /// The backend failed to prepare or execute a query
    #[error("Backend error: {0}")]
    Backend(ErrorFields),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid usage (e.g., bad configuration)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
}

impl Error {
    /// Returns true if the connection cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Framing(_) | Error::Io(_))
    }

    /// Get the SQLSTATE code reported to the client for this error.
    pub fn sqlstate(&self) -> &str {
        match self {
            Error::Framing(_) | Error::Protocol(_) => sqlstate::PROTOCOL_VIOLATION,
            Error::UndefinedStatement(_) => sqlstate::INVALID_SQL_STATEMENT_NAME,
            Error::UndefinedPortal(_) => sqlstate::INVALID_CURSOR_NAME,
            Error::DuplicateStatement(_) => sqlstate::DUPLICATE_PREPARED_STATEMENT,
            Error::InFailedTransaction => sqlstate::IN_FAILED_SQL_TRANSACTION,
            Error::Backend(fields) => fields.code.as_deref().unwrap_or(sqlstate::INTERNAL_ERROR),
            Error::Io(_) | Error::InvalidUsage(_) => sqlstate::INTERNAL_ERROR,
        }
    }

    /// Render this error as ErrorResponse fields.
    pub fn to_fields(&self) -> ErrorFields {
        let severity = if self.is_fatal() {
            Severity::Fatal
        } else {
            Severity::Error
        };
        match self {
            Error::Backend(fields) => fields.clone(),
            Error::Framing(msg) | Error::Protocol(msg) => {
                ErrorFields::new(severity, self.sqlstate(), msg.clone())
            }
            _ => ErrorFields::new(severity, self.sqlstate(), self.to_string()),
        }
    }
}

impl From<ErrorFields> for Error {
    fn from(fields: ErrorFields) -> Self {
        Error::Backend(fields)
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized>
    From<zerocopy::error::CastError<Src, Dst>> for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Framing(format!("zerocopy cast error: {err:?}"))
    }
}
