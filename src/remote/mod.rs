//! Remote survey platform abstraction
//!
//! A [`RemotePlatform`] speaks the remote side of the gateway: it opens and
//! closes sessions and forwards positional calls under a session key. The
//! session manager and dispatcher only ever see this trait, so the concrete
//! LimeSurvey client can be swapped for a stub in tests.

mod limesurvey;

pub use limesurvey::LimeSurveyClient;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::session::{Credentials, SessionKey};

/// A single positional argument of a remote call
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    /// Plain JSON value
    Json(Value),
    /// Binary payload; the client decides how it travels on the wire
    Binary(Bytes),
}

impl From<Value> for CallArg {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Raw successful reply of a remote call
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// JSON result
    Json(Value),
    /// Binary result
    Binary(Bytes),
}

/// Untranslated failure reported by a [`RemotePlatform`]
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Structured JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// Remote error code
        code: i64,
        /// Remote error message
        message: String,
        /// Optional error data
        data: Option<Value>,
    },

    /// HTTP layer failure (connect, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// The call did not complete within the allotted time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Response body was not a JSON-RPC response
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Session open was refused by the platform
    #[error("Credentials rejected: {0}")]
    Rejected(String),

    /// Error payload of an unrecognized shape
    #[error("Remote error: {0}")]
    Other(Value),
}

/// Remote survey platform
#[async_trait]
pub trait RemotePlatform: Send + Sync {
    /// Open a session, yielding the key that authorizes subsequent calls
    async fn open_session(&self, credentials: &Credentials) -> Result<SessionKey, RemoteError>;

    /// Invoke `method` with the session key prepended to `args`
    async fn call(
        &self,
        session: &SessionKey,
        method: &str,
        args: Vec<CallArg>,
    ) -> Result<Reply, RemoteError>;

    /// Release a session
    async fn close_session(&self, session: &SessionKey) -> Result<(), RemoteError>;
}
