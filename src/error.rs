//! Error types for the JSON-RPC implementation.
//!
//! This module defines implementation-level errors. The JSON-RPC error objects
//! that travel over the wire are [`ErrorCode`] values from the `codes` module.
//! A callback can return either kind: [`Error::Rpc`] is sent verbatim, every
//! other variant is reported as an internal error carrying its display text.

use std::io;

use crate::codes::ErrorCode;

/// Internal errors that can occur during JSON-RPC processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A JSON-RPC error object to be sent to the peer as is.
    #[error("{0}")]
    Rpc(ErrorCode),

    /// A callback failed. The message becomes the error message.
    #[error("{0}")]
    Failed(String),

    /// Transport I/O error.
    #[error("Transport error: {0}")]
    TransportError(#[from] io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Operation was cancelled.
    #[error("Operation was cancelled")]
    Cancelled,

    /// No response arrived in time.
    #[error("Timed out waiting for response to {0}")]
    TimedOut(String),
}

impl Error {
    /// Create an error that is sent to the peer with the given code.
    pub fn rpc(code: impl Into<i32>, message: impl Into<String>) -> Self {
        Self::Rpc(ErrorCode::new(code, message))
    }

    /// Create a generic callback failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Create a new transport error.
    pub fn transport(error: impl Into<io::Error>) -> Self {
        Self::TransportError(error.into())
    }

    /// The error object reported to the peer.
    ///
    /// [`Error::Rpc`] passes through unchanged. Anything else becomes
    /// `INTERNAL_ERROR` with the display text as message.
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            Error::Rpc(code) => code.clone(),
            other => ErrorCode::new(crate::codes::Code::InternalError, other.to_string()),
        }
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Self::Rpc(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_errors_pass_through() {
        let error = Error::rpc(-32000, "Custom");
        let code = error.to_error_code();
        assert_eq!(code.code, -32000);
        assert_eq!(code.message, "Custom");
        assert_eq!(code.data, None);
    }

    #[test]
    fn other_errors_become_internal() {
        let code = Error::failed("Division by zero").to_error_code();
        assert_eq!(code.code, -32603);
        assert_eq!(code.message, "Division by zero");
        assert_eq!(code.data, None);

        assert_eq!(Error::Cancelled.to_error_code().message, "Operation was cancelled");
    }
}
