//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and carry a
//! stable wire code so they survive the trip across the IPC transport.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for toolbridge.
#[derive(Error, Debug)]
pub enum Error {
    /// Endpoint unreachable or connection lost (wire code CONNECTION).
    #[error("connection error: {0}")]
    Connection(String),

    /// No response within the budget (wire code TIMEOUT).
    #[error("timeout: {0}")]
    Timeout(String),

    /// Malformed frame or response shape (wire code PROTOCOL).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Tool name not present in the registry (wire code UNKNOWN_TOOL).
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments failed the tool's input schema (wire code INVALID_ARGUMENTS).
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Tool name registered twice (wire code ALREADY_EXISTS).
    #[error("duplicate tool name: {0}")]
    DuplicateName(String),

    /// Backing store execution error (wire code STORE_FAULT).
    #[error("store fault: {0}")]
    Store(String),

    /// Every discovery candidate failed its probe.
    #[error("no server found: {0}")]
    NoServerFound(String),

    /// Reasoning capability failed or produced an unusable reply.
    #[error("reasoning error: {0}")]
    Reasoning(String),

    /// Validation errors (wire code INVALID_ARGUMENT).
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found (wire code NOT_FOUND).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request arrived in the wrong connection state (wire code FAILED_PRECONDITION).
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// Budget exhausted (wire code RESOURCE_EXHAUSTED).
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Internal errors (wire code INTERNAL).
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wire error code carried in IPC error responses.
    pub fn to_ipc_error_code(&self) -> &'static str {
        match self {
            Error::Connection(_) => "CONNECTION",
            Error::Timeout(_) => "TIMEOUT",
            Error::Protocol(_) => "PROTOCOL",
            Error::UnknownTool(_) => "UNKNOWN_TOOL",
            Error::InvalidArguments(_) => "INVALID_ARGUMENTS",
            Error::DuplicateName(_) => "ALREADY_EXISTS",
            Error::Store(_) => "STORE_FAULT",
            Error::NoServerFound(_) => "UNAVAILABLE",
            Error::Reasoning(_) => "REASONING",
            Error::Validation(_) => "INVALID_ARGUMENT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::FailedPrecondition(_) => "FAILED_PRECONDITION",
            Error::QuotaExceeded(_) => "RESOURCE_EXHAUSTED",
            Error::Internal(_) => "INTERNAL",
            Error::Serialization(_) => "INTERNAL",
            Error::Io(_) => "INTERNAL",
        }
    }

    /// Message carried next to the wire code, without the display prefix.
    pub fn wire_message(&self) -> String {
        match self {
            Error::Connection(m)
            | Error::Timeout(m)
            | Error::Protocol(m)
            | Error::UnknownTool(m)
            | Error::InvalidArguments(m)
            | Error::DuplicateName(m)
            | Error::Store(m)
            | Error::NoServerFound(m)
            | Error::Reasoning(m)
            | Error::Validation(m)
            | Error::NotFound(m)
            | Error::FailedPrecondition(m)
            | Error::QuotaExceeded(m)
            | Error::Internal(m) => m.clone(),
            Error::Serialization(e) => e.to_string(),
            Error::Io(e) => e.to_string(),
        }
    }

    /// Rebuild an error from a wire code and message received from a peer.
    ///
    /// Unrecognised codes map to `Internal` so nothing is silently dropped.
    pub fn from_ipc_error(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "CONNECTION" => Error::Connection(message),
            "TIMEOUT" => Error::Timeout(message),
            "PROTOCOL" => Error::Protocol(message),
            "UNKNOWN_TOOL" => Error::UnknownTool(message),
            "INVALID_ARGUMENTS" => Error::InvalidArguments(message),
            "ALREADY_EXISTS" => Error::DuplicateName(message),
            "STORE_FAULT" => Error::Store(message),
            "UNAVAILABLE" => Error::NoServerFound(message),
            "REASONING" => Error::Reasoning(message),
            "INVALID_ARGUMENT" => Error::Validation(message),
            "NOT_FOUND" => Error::NotFound(message),
            "FAILED_PRECONDITION" => Error::FailedPrecondition(message),
            "RESOURCE_EXHAUSTED" => Error::QuotaExceeded(message),
            _ => Error::Internal(message),
        }
    }

    /// Whether an agent session should hand this error back to the reasoner
    /// as a failed tool result instead of aborting the turn.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_)
                | Error::InvalidArguments(_)
                | Error::Store(_)
                | Error::Validation(_)
                | Error::Internal(_)
        )
    }
}

// Convenience constructors
impl Error {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn unknown_tool(msg: impl Into<String>) -> Self {
        Self::UnknownTool(msg.into())
    }

    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn reasoning(msg: impl Into<String>) -> Self {
        Self::Reasoning(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    pub fn quota_exceeded(msg: impl Into<String>) -> Self {
        Self::QuotaExceeded(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}
