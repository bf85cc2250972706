//! Error types

use crate::protocol::ErrorFields;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while establishing or using a session
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be completed or is inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure (dial, read, write), passed through unchanged
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The server answered the SSLRequest with something other than `S`
    #[error("server refused TLS connection")]
    TlsRefused,

    /// Malformed or out-of-sequence protocol data
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A message kind that is not valid at this point of the handshake
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// The server asked for an authentication method we do not implement
    #[error("unknown authentication method: {0}")]
    UnsupportedAuth(i32),

    /// Authentication exchange failed on the client side
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Error reported by the server in an ErrorResponse
    #[error(transparent)]
    Server(Box<ServerError>),

    /// The stream reached EOF while a frame was expected
    #[error("connection closed")]
    ConnectionClosed,

    /// Illegal handshake phase transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Phase the machine was in
        expected: String,
        /// Phase that was requested
        actual: String,
    },
}

impl Error {
    /// SQLSTATE code if this is a server-reported error
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(err) => Some(err.code()),
            _ => None,
        }
    }

    /// Whether this error came from the server rather than the client or transport
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Server(_))
    }
}

impl From<ServerError> for Error {
    fn from(err: ServerError) -> Self {
        Error::Server(Box::new(err))
    }
}

/// Error reported by the Postgres server.
///
/// See <https://www.postgresql.org/docs/current/protocol-error-fields.html> for
/// the meaning of each field. Values can only be obtained by decoding an
/// ErrorResponse frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    severity: String,
    severity_nonlocalized: Option<String>,
    code: String,
    message: String,
    detail: Option<String>,
    hint: Option<String>,
    position: Option<u32>,
    internal_position: Option<u32>,
    internal_query: Option<String>,
    where_: Option<String>,
    schema: Option<String>,
    table: Option<String>,
    column: Option<String>,
    data_type: Option<String>,
    constraint: Option<String>,
    file: Option<String>,
    line: Option<u32>,
    routine: Option<String>,
}

impl ServerError {
    /// Localized severity (`ERROR`, `FATAL`, `PANIC`, ...)
    pub fn severity(&self) -> &str {
        &self.severity
    }

    /// Severity that is never localized (Postgres 9.6+)
    pub fn severity_nonlocalized(&self) -> Option<&str> {
        self.severity_nonlocalized.as_deref()
    }

    /// SQLSTATE code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Primary human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Secondary message with more detail
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Suggestion on what to do about the problem
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// 1-based character index into the original query string
    pub fn position(&self) -> Option<u32> {
        self.position
    }

    /// Position into an internally generated command
    pub fn internal_position(&self) -> Option<u32> {
        self.internal_position
    }

    /// Text of the internally generated command
    pub fn internal_query(&self) -> Option<&str> {
        self.internal_query.as_deref()
    }

    /// Call stack context
    pub fn where_(&self) -> Option<&str> {
        self.where_.as_deref()
    }

    /// Schema name
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Table name
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Column name
    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// Data type name
    pub fn data_type(&self) -> Option<&str> {
        self.data_type.as_deref()
    }

    /// Constraint name
    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    /// Server source file that reported the error
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Server source line that reported the error
    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// Server source routine that reported the error
    pub fn routine(&self) -> Option<&str> {
        self.routine.as_deref()
    }
}

impl From<ErrorFields> for ServerError {
    fn from(fields: ErrorFields) -> Self {
        // Numeric fields are sent as text; unparsable values are dropped.
        let number = |v: Option<String>| v.and_then(|s| s.trim().parse::<u32>().ok());

        Self {
            severity: fields.severity.unwrap_or_default(),
            severity_nonlocalized: fields.severity_nonlocalized,
            code: fields.code.unwrap_or_default(),
            message: fields.message.unwrap_or_default(),
            detail: fields.detail,
            hint: fields.hint,
            position: number(fields.position),
            internal_position: number(fields.internal_position),
            internal_query: fields.internal_query,
            where_: fields.where_,
            schema: fields.schema,
            table: fields.table,
            column: fields.column,
            data_type: fields.data_type,
            constraint: fields.constraint,
            file: fields.file,
            line: number(fields.line),
            routine: fields.routine,
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (SQLSTATE {})", self.severity, self.message, self.code)
    }
}

impl std::error::Error for ServerError {}
