//! Error types for the LimeSurvey gateway

use std::io;

use serde_json::{Value, json};
use thiserror::Error;

use crate::fault::RemoteFault;

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway errors
///
/// The first four variants are the caller-visible taxonomy of a dispatched
/// call. The rest cover configuration, transport plumbing and serialization.
#[derive(Error, Debug)]
pub enum Error {
    /// No resource or tool is registered under this name
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Argument failed local validation
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// Parameter name
        name: String,
        /// What was wrong with it
        reason: String,
    },

    /// The remote platform rejected the credentials or was unreachable
    #[error("Session open failed: {0}")]
    SessionOpenFailed(String),

    /// The remote platform failed the operation
    #[error("Remote fault [{}]: {}", .0.code, .0.message)]
    Remote(RemoteFault),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Protocol error (malformed inbound JSON-RPC)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownOperation(_) => "unknown_operation",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::SessionOpenFailed(_) => "session_open_failed",
            Self::Remote(_) => "remote_fault",
            Self::Config(_) => "config",
            Self::Protocol(_) => "protocol",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Internal(_) => "internal",
        }
    }

    /// Convert to JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::Json(_) => rpc_codes::PARSE_ERROR,
            Self::Protocol(_) => rpc_codes::INVALID_REQUEST,
            Self::UnknownOperation(_) => rpc_codes::METHOD_NOT_FOUND,
            Self::InvalidArgument { .. } => rpc_codes::INVALID_PARAMS,
            Self::SessionOpenFailed(_) => rpc_codes::SESSION_OPEN_FAILED,
            Self::Remote(_) => rpc_codes::REMOTE_FAULT,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }

    /// Structured error data attached to JSON-RPC error responses
    #[must_use]
    pub fn to_rpc_data(&self) -> Value {
        match self {
            Self::Remote(fault) => json!({
                "kind": self.kind(),
                "code": fault.code.to_string(),
                "message": fault.message,
                "raw": fault.raw,
            }),
            Self::InvalidArgument { name, .. } => json!({
                "kind": self.kind(),
                "argument": name,
            }),
            _ => json!({ "kind": self.kind() }),
        }
    }
}

impl From<RemoteFault> for Error {
    fn from(fault: RemoteFault) -> Self {
        Self::Remote(fault)
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Session could not be opened against the remote platform
    pub const SESSION_OPEN_FAILED: i32 = -32001;
    /// Remote platform failed the operation
    pub const REMOTE_FAULT: i32 = -32002;
}
