use thiserror::Error;

/// Result type alias for dispatch operations
pub type Result<T, E = PushError> = std::result::Result<T, E>;

/// Broad failure categories a caller can present differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised before any network I/O, never retried.
    Configuration,
    /// Network unreachable, DNS failure, timeout.
    Transport,
    /// Non-2xx HTTP status.
    Protocol,
    /// Response body was not valid JSON.
    Decode,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Decode => "decode",
        }
    }
}

/// Errors that can occur while dispatching a push
#[derive(Error, Debug)]
pub enum PushError {
    #[error("Encryption is enabled but no key is configured")]
    MissingEncryptionKey,

    #[error("Invalid AES key length: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeyLength(usize),

    #[error("Invalid IV length: {0} bytes (expected 16)")]
    InvalidIvLength(usize),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("No device in the target list declares a server")]
    NoDeliverableDevices,

    #[error("Failed to serialize payload: {0}")]
    PayloadSerialization(String),

    #[error("Request to {0} failed: {1}")]
    RequestFailed(String, String),

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("HTTP error! status: {0}")]
    HttpStatus(u16),

    #[error("Invalid response body: {0}")]
    InvalidResponse(String),
}

impl PushError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PushError::MissingEncryptionKey
            | PushError::InvalidKeyLength(_)
            | PushError::InvalidIvLength(_)
            | PushError::InvalidUrl(_)
            | PushError::NoDeliverableDevices
            | PushError::PayloadSerialization(_) => ErrorKind::Configuration,
            PushError::RequestFailed(..) | PushError::Timeout(_) => ErrorKind::Transport,
            PushError::HttpStatus(_) => ErrorKind::Protocol,
            PushError::InvalidResponse(_) => ErrorKind::Decode,
        }
    }
}
