//! # castate Error
//!
//! Unified error types for the castate chain-abstraction adapter. Every crate
//! in the workspace reports failures through [`CaError`] so the UI layer sees a
//! single error surface, whether the failure came from the wallet provider,
//! the chain-abstraction SDK or the adapter's own bookkeeping.
//!
//! ## Error Categories
//!
//! - Session errors: no session, provider not injected
//! - Negotiation errors: no pending allowance/intent request, responder closed
//! - SDK errors: failures reported by the chain-abstraction client
//! - Provider errors: JSON-RPC and transport failures of the wallet provider
//! - Configuration and parsing errors
//!
//! ## Example
//!
//! ```
//! use castate_error::{CaError, Result};
//!
//! fn require_marker(marker: &str) -> Result<()> {
//!     if marker.is_empty() {
//!         return Err(CaError::ConfigError("balance refresh marker is empty".into()));
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use thiserror::Error;

/// The main error type for castate operations.
#[derive(Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CaError {
    // ============ Session Errors ============
    /// An operation needed a session client but none has been created
    #[error("No chain-abstraction session has been started")]
    NoSession,

    /// No wallet provider was found in the injected slot
    #[error("No wallet provider injected in slot '{0}'")]
    ProviderNotInjected(String),

    // ============ Negotiation Errors ============
    /// Accept/reject was called while no request of that kind is pending
    #[error("No pending {0} request")]
    NoPendingRequest(&'static str),

    /// The SDK side of a negotiation channel went away
    #[error("{0} responder closed before a decision was delivered")]
    ResponderClosed(&'static str),

    /// The intent request carries no refresh capability
    #[error("Intent refresh is not available")]
    RefreshUnavailable,

    // ============ SDK Errors ============
    /// A call into the chain-abstraction SDK failed
    #[error("SDK call '{operation}' failed: {reason}")]
    Sdk {
        /// SDK operation name
        operation: String,
        /// Error reason
        reason: String,
    },

    // ============ Provider Errors ============
    /// RPC request failed
    #[error("RPC request failed: {method} - {reason}")]
    RpcRequestError {
        /// RPC method name
        method: String,
        /// Error reason
        reason: String,
    },

    /// JSON-RPC error response
    #[error("RPC error: code={code}, message={message}")]
    RpcError {
        /// Error code
        code: i64,
        /// Error message
        message: String,
    },

    /// Invalid address format
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress {
        /// The invalid address
        address: String,
        /// Reason for invalidity
        reason: String,
    },

    // ============ Parsing / Config Errors ============
    /// Invalid amount format
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Unknown or malformed progress event
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// JSON parse error
    #[error("JSON error: {0}")]
    JsonError(String),

    /// File IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ============ Generic ============
    /// Wrapped error from external source
    #[error("External error: {message}")]
    External {
        /// Error message
        message: String,
    },

    /// Unknown/other error
    #[error("{0}")]
    Other(String),
}

/// Convenient Result type using CaError
pub type Result<T> = std::result::Result<T, CaError>;

impl CaError {
    /// Builds an [`CaError::Sdk`] for the given operation
    pub fn sdk(operation: impl Into<String>, reason: impl ToString) -> Self {
        CaError::Sdk {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    /// Adds context to an error
    fn context(self, ctx: impl Into<String>) -> Result<T>;

    /// Adds context using a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| CaError::External {
            message: format!("{}: {}", ctx.into(), e),
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| CaError::External {
            message: format!("{}: {}", f(), e),
        })
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| CaError::Other(ctx.into()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| CaError::Other(f()))
    }
}

// ============ From implementations for common error types ============

impl From<std::io::Error> for CaError {
    fn from(err: std::io::Error) -> Self {
        CaError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for CaError {
    fn from(err: serde_json::Error) -> Self {
        CaError::JsonError(err.to_string())
    }
}

impl From<std::num::ParseIntError> for CaError {
    fn from(err: std::num::ParseIntError) -> Self {
        CaError::InvalidAmount(err.to_string())
    }
}

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// Unknown error
    Unknown = 0,
    /// No session
    NoSession = 1001,
    /// Provider not injected
    ProviderNotInjected = 1004,
    /// No pending request
    NoPendingRequest = 2001,
    /// Responder closed
    ResponderClosed = 2002,
    /// Refresh unavailable
    RefreshUnavailable = 2003,
    /// SDK error
    Sdk = 3001,
    /// RPC request error
    RpcRequestError = 4002,
    /// RPC error response
    RpcError = 4003,
    /// Invalid address
    InvalidAddress = 4004,
    /// Invalid event
    InvalidEvent = 5001,
    /// Configuration error
    ConfigError = 6001,
}

impl CaError {
    /// Returns the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            CaError::NoSession => ErrorCode::NoSession,
            CaError::ProviderNotInjected(_) => ErrorCode::ProviderNotInjected,
            CaError::NoPendingRequest(_) => ErrorCode::NoPendingRequest,
            CaError::ResponderClosed(_) => ErrorCode::ResponderClosed,
            CaError::RefreshUnavailable => ErrorCode::RefreshUnavailable,
            CaError::Sdk { .. } => ErrorCode::Sdk,
            CaError::RpcRequestError { .. } => ErrorCode::RpcRequestError,
            CaError::RpcError { .. } => ErrorCode::RpcError,
            CaError::InvalidAddress { .. } => ErrorCode::InvalidAddress,
            CaError::InvalidEvent(_) => ErrorCode::InvalidEvent,
            CaError::ConfigError(_) => ErrorCode::ConfigError,
            _ => ErrorCode::Unknown,
        }
    }

    /// Returns true if the error came from the SDK or the provider rather
    /// than from the adapter's own state
    pub fn is_downstream(&self) -> bool {
        matches!(
            self,
            CaError::Sdk { .. }
                | CaError::RpcRequestError { .. }
                | CaError::RpcError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CaError::sdk("getUnifiedBalances", "backend unavailable");
        assert!(err.to_string().contains("getUnifiedBalances"));
        assert!(err.to_string().contains("backend unavailable"));
    }

    #[test]
    fn test_error_code() {
        assert_eq!(CaError::NoSession.code(), ErrorCode::NoSession);
        assert_eq!(
            CaError::NoPendingRequest("allowance").code(),
            ErrorCode::NoPendingRequest
        );
        assert_eq!(CaError::Other("x".into()).code(), ErrorCode::Unknown);
    }

    #[test]
    fn test_downstream() {
        assert!(CaError::sdk("bridge", "reverted").is_downstream());
        assert!(CaError::RpcError { code: -32000, message: "boom".into() }.is_downstream());
        assert!(!CaError::NoSession.is_downstream());
        assert!(!CaError::ResponderClosed("intent").is_downstream());
    }

    #[test]
    fn test_no_pending_message() {
        let err = CaError::NoPendingRequest("intent");
        assert_eq!(err.to_string(), "No pending intent request");
    }

    #[test]
    fn test_error_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file missing"));

        let with_ctx = result.context("Failed to load config");
        assert!(with_ctx.is_err());
        assert!(with_ctx.unwrap_err().to_string().contains("Failed to load config"));
    }

    #[test]
    fn test_option_context() {
        let missing: Option<u8> = None;
        let err = missing.with_context(|| "slot 'ethereum' empty".to_string()).unwrap_err();
        assert!(matches!(err, CaError::Other(ref m) if m.contains("ethereum")));
    }

    #[test]
    fn test_from_json_error() {
        let err: CaError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.code(), ErrorCode::Unknown);
        assert!(err.to_string().starts_with("JSON error"));
    }
}
