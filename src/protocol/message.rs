//! Protocol message types

use bytes::Bytes;

/// Frontend message (client → server)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendMessage {
    /// Startup message
    Startup {
        /// Protocol version
        version: i32,
        /// Connection parameters, written in order
        params: Vec<(String, String)>,
    },

    /// Password message (cleartext or MD5 digest)
    Password(String),

    /// Simple query message
    Query(String),

    /// Terminate message
    Terminate,

    /// SASL initial response message
    SaslInitialResponse {
        /// SASL mechanism name (e.g., "SCRAM-SHA-256")
        mechanism: String,
        /// SASL client first message data
        data: Vec<u8>,
    },

    /// SASL response message
    SaslResponse {
        /// SASL client final message data
        data: Vec<u8>,
    },

    /// SSLRequest message (TLS negotiation)
    SslRequest,
}

/// Backend message (server → client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage {
    /// Authentication request
    Authentication(AuthenticationMessage),

    /// Backend key data (for cancellation)
    BackendKeyData {
        /// Process ID
        process_id: u32,
        /// Secret key
        secret_key: u32,
    },

    /// Error response
    ErrorResponse(ErrorFields),

    /// Notice response
    NoticeResponse(ErrorFields),

    /// Parameter status
    ParameterStatus {
        /// Parameter name
        name: String,
        /// Parameter value
        value: String,
    },

    /// Ready for query
    ReadyForQuery {
        /// Transaction status
        status: u8,
    },

    /// Any other frame, left undecoded
    Other {
        /// Message type tag
        tag: u8,
        /// Frame body (without tag and length)
        body: Bytes,
    },
}

impl BackendMessage {
    /// Short name of the message kind, for logs and error messages
    pub fn kind(&self) -> String {
        match self {
            BackendMessage::Authentication(_) => "Authentication".to_string(),
            BackendMessage::BackendKeyData { .. } => "BackendKeyData".to_string(),
            BackendMessage::ErrorResponse(_) => "ErrorResponse".to_string(),
            BackendMessage::NoticeResponse(_) => "NoticeResponse".to_string(),
            BackendMessage::ParameterStatus { .. } => "ParameterStatus".to_string(),
            BackendMessage::ReadyForQuery { .. } => "ReadyForQuery".to_string(),
            BackendMessage::Other { tag, body } => {
                if tag.is_ascii_graphic() {
                    format!("'{}' ({} bytes)", *tag as char, body.len())
                } else {
                    format!("0x{:02X} ({} bytes)", tag, body.len())
                }
            }
        }
    }
}

/// Authentication message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationMessage {
    /// Authentication OK
    Ok,

    /// Cleartext password required
    CleartextPassword,

    /// MD5 password required
    Md5Password {
        /// Salt for MD5 hash
        salt: [u8; 4],
    },

    /// SASL authentication mechanisms available (Postgres 10+)
    Sasl {
        /// List of SASL mechanism names (e.g., ["SCRAM-SHA-256"])
        mechanisms: Vec<String>,
    },

    /// SASL continuation message (server challenge)
    SaslContinue {
        /// SASL server first/continue message data
        data: Vec<u8>,
    },

    /// SASL final message (server verification)
    SaslFinal {
        /// SASL server final message data
        data: Vec<u8>,
    },

    /// Any other authentication code (Kerberos, GSSAPI, SSPI, ...)
    Unsupported(i32),
}

/// Error/notice fields, as sent by the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorFields {
    /// Severity (ERROR, WARNING, etc.), possibly localized
    pub severity: Option<String>,
    /// Severity, never localized
    pub severity_nonlocalized: Option<String>,
    /// SQLSTATE code
    pub code: Option<String>,
    /// Human-readable message
    pub message: Option<String>,
    /// Additional detail
    pub detail: Option<String>,
    /// Hint
    pub hint: Option<String>,
    /// Position in query string
    pub position: Option<String>,
    /// Position in internal query
    pub internal_position: Option<String>,
    /// Internal query text
    pub internal_query: Option<String>,
    /// Context (call stack)
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
    /// Source file
    pub file: Option<String>,
    /// Source line
    pub line: Option<String>,
    /// Source routine
    pub routine: Option<String>,
}

impl std::fmt::Display for ErrorFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref msg) = self.message {
            write!(f, "{}", msg)?;
        }
        if let Some(ref code) = self.code {
            write!(f, " ({})", code)?;
        }
        Ok(())
    }
}
