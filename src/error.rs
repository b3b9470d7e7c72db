use thiserror::Error;

use crate::decode::DecodeError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The AI service rejected our credentials (HTTP 401).
    #[error("Authentication required: {0}")]
    Auth(String),

    /// Transport-level failure talking to the AI service.
    #[error("Network error: {0}")]
    Network(String),

    /// The request was abandoned because its session token was signalled.
    #[error("Request was canceled")]
    Cancelled,

    /// Rate limiting, server failures and any other non-success status.
    #[error("AI service error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Well-formed JSON with the wrong shape.
    #[error("Unexpected response shape: {0}")]
    Validation(String),

    /// The operation needs state that is not there yet.
    #[error("{0}")]
    Precondition(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Shape errors are recovered the same way as unparseable text.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::Validation(_))
    }
}
