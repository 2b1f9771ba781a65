//! Remote fault translation
//!
//! The remote platform reports failure two ways: as a transport or JSON-RPC
//! error, or as a successful reply whose body is a lone `{"status": "..."}`
//! mapping. Both end up as a [`RemoteFault`] carrying a code, a message and
//! the raw payload.

use std::fmt;

use serde_json::{Map, Value, json};

use crate::remote::{RemoteError, Reply};

/// Status text the platform uses for success
const STATUS_OK: &str = "OK";

/// Origin of a remote fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    /// Code from a structured JSON-RPC error object
    Rpc(i64),
    /// Status text in an otherwise successful reply
    Status,
    /// Transport-level failure (connect, timeout, HTTP status, malformed body)
    Transport,
    /// Error payload of an unrecognized shape
    Unknown,
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(code) => write!(f, "{code}"),
            Self::Status => f.write_str("status"),
            Self::Transport => f.write_str("transport"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Failure reported by the remote platform for an otherwise valid call
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFault {
    /// Fault origin and code
    pub code: FaultCode,
    /// Human-readable message
    pub message: String,
    /// Raw payload as received
    pub raw: Value,
}

/// Translate a raw remote error into a [`RemoteFault`]
#[must_use]
pub fn translate(error: RemoteError) -> RemoteFault {
    match error {
        RemoteError::Rpc {
            code,
            message,
            data,
        } => {
            let mut raw = Map::new();
            raw.insert("code".to_string(), json!(code));
            raw.insert("message".to_string(), json!(message));
            if let Some(data) = data {
                raw.insert("data".to_string(), data);
            }
            RemoteFault {
                code: FaultCode::Rpc(code),
                message,
                raw: Value::Object(raw),
            }
        }
        RemoteError::Http(e) => RemoteFault {
            code: FaultCode::Transport,
            message: e.to_string(),
            raw: json!({
                "error": e.to_string(),
                "connect": e.is_connect(),
                "timeout": e.is_timeout(),
            }),
        },
        RemoteError::HttpStatus { status, body } => RemoteFault {
            code: FaultCode::Transport,
            message: format!("HTTP {status}"),
            raw: json!({ "status": status, "body": body }),
        },
        RemoteError::Timeout(after) => RemoteFault {
            code: FaultCode::Transport,
            message: format!("timed out after {after:?}"),
            raw: json!({ "timeout_ms": u64::try_from(after.as_millis()).unwrap_or(u64::MAX) }),
        },
        RemoteError::Malformed(reason) => RemoteFault {
            code: FaultCode::Transport,
            message: format!("malformed response: {reason}"),
            raw: Value::String(reason),
        },
        RemoteError::Rejected(reason) => RemoteFault {
            code: FaultCode::Unknown,
            message: reason.clone(),
            raw: Value::String(reason),
        },
        RemoteError::Other(payload) => RemoteFault {
            code: FaultCode::Unknown,
            message: match &payload {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            raw: payload,
        },
    }
}

/// Detect a failure encoded in a successful reply
///
/// A mapping whose only key is `status`, holding any string but `OK`, is a
/// fault.
#[must_use]
pub fn inspect_reply(reply: &Reply) -> Option<RemoteFault> {
    let Reply::Json(Value::Object(object)) = reply else {
        return None;
    };
    if object.len() != 1 {
        return None;
    }
    match object.get("status") {
        Some(Value::String(status)) if status != STATUS_OK => Some(RemoteFault {
            code: FaultCode::Status,
            message: status.clone(),
            raw: Value::Object(object.clone()),
        }),
        _ => None,
    }
}
