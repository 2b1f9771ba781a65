//! LimeSurvey RemoteControl 2 JSON-RPC client
//!
//! Every call is a single `POST` of `{"method", "params", "id"}` to the
//! RemoteControl endpoint, with the session key as the first positional
//! parameter. Binary arguments travel base64-encoded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, header};
use serde_json::{Value, json};
use tracing::debug;

use super::{CallArg, RemoteError, RemotePlatform, Reply};
use crate::session::{Credentials, SessionKey};
use crate::{Error, Result};

/// Maximum number of body bytes kept in an HTTP status error
const MAX_ERROR_BODY: usize = 512;

/// HTTP JSON-RPC client for a LimeSurvey installation
pub struct LimeSurveyClient {
    /// HTTP client
    client: Client,
    /// Request ID counter
    request_id: AtomicU64,
    /// Per-request timeout
    timeout: Duration,
}

impl LimeSurveyClient {
    /// Create a new client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            request_id: AtomicU64::new(1),
            timeout,
        })
    }

    /// Send one JSON-RPC request and return its `result` member
    async fn send(
        &self,
        endpoint: &str,
        method: &str,
        params: Vec<Value>,
    ) -> std::result::Result<Value, RemoteError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "method": method,
            "params": params,
            "id": id,
        });

        debug!(method = %method, id = id, "LimeSurvey request");

        let response = self
            .client
            .post(endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(RemoteError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(|e| self.classify(e))?;
        parse_response(&text)
    }

    fn classify(&self, error: reqwest::Error) -> RemoteError {
        if error.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else {
            RemoteError::Http(error)
        }
    }
}

/// Split a JSON-RPC response body into its result or error
fn parse_response(text: &str) -> std::result::Result<Value, RemoteError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| RemoteError::Malformed(format!("invalid JSON: {e}")))?;

    let Value::Object(mut object) = value else {
        return Err(RemoteError::Malformed(
            "response is not a JSON object".to_string(),
        ));
    };

    match object.remove("error") {
        None | Some(Value::Null) => {}
        Some(Value::Object(error)) => {
            let code = error.get("code").and_then(Value::as_i64);
            let message = error.get("message").and_then(Value::as_str);
            return Err(match (code, message) {
                (Some(code), Some(message)) => RemoteError::Rpc {
                    code,
                    message: message.to_string(),
                    data: error.get("data").cloned(),
                },
                _ => RemoteError::Other(Value::Object(error)),
            });
        }
        Some(other) => return Err(RemoteError::Other(other)),
    }

    Ok(object.remove("result").unwrap_or(Value::Null))
}

/// Encode a call argument for the wire
fn encode_arg(arg: CallArg) -> Value {
    match arg {
        CallArg::Json(value) => value,
        CallArg::Binary(bytes) => Value::String(STANDARD.encode(&bytes)),
    }
}

#[async_trait]
impl RemotePlatform for LimeSurveyClient {
    async fn open_session(
        &self,
        credentials: &Credentials,
    ) -> std::result::Result<SessionKey, RemoteError> {
        let result = self
            .send(
                &credentials.url,
                "get_session_key",
                vec![
                    Value::String(credentials.username.clone()),
                    Value::String(credentials.password.clone()),
                ],
            )
            .await?;

        match result {
            Value::String(key) if !key.is_empty() => Ok(SessionKey::new(&credentials.url, key)),
            Value::Object(object) => Err(RemoteError::Rejected(
                object
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("no session key returned")
                    .to_string(),
            )),
            other => Err(RemoteError::Malformed(format!(
                "unexpected session key: {other}"
            ))),
        }
    }

    async fn call(
        &self,
        session: &SessionKey,
        method: &str,
        args: Vec<CallArg>,
    ) -> std::result::Result<Reply, RemoteError> {
        let mut params = Vec::with_capacity(args.len() + 1);
        params.push(Value::String(session.key().to_string()));
        params.extend(args.into_iter().map(encode_arg));

        self.send(session.endpoint(), method, params)
            .await
            .map(Reply::Json)
    }

    async fn close_session(&self, session: &SessionKey) -> std::result::Result<(), RemoteError> {
        self.send(
            session.endpoint(),
            "release_session_key",
            vec![Value::String(session.key().to_string())],
        )
        .await
        .map(|_| ())
    }
}
