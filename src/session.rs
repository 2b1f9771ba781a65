//! Session lifecycle
//!
//! Every dispatched call runs inside exactly one remote session, opened
//! right before the call and released right after it. Sessions are never
//! pooled, shared or persisted.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::remote::{CallArg, RemoteError, RemotePlatform, Reply};
use crate::{Error, Result};

/// Login material for the remote platform
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// RemoteControl endpoint URL
    pub url: String,
    /// Account name
    pub username: String,
    /// Account password
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Names of the fields that are empty
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("url", &self.url),
            ("username", &self.username),
            ("password", &self.password),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    fn check(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::SessionOpenFailed(format!(
                "missing credentials: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Key authorizing calls within one remote session
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
    endpoint: String,
    key: String,
}

impl SessionKey {
    /// Create a session key bound to the endpoint that issued it
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
        }
    }

    /// Endpoint the session lives on
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Raw key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("endpoint", &self.endpoint)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Handle to an open session, passed to the body of [`SessionManager::with_session`]
pub struct Session {
    platform: Arc<dyn RemotePlatform>,
    key: SessionKey,
}

impl Session {
    /// Invoke a remote method within this session
    pub async fn call(
        &self,
        method: &str,
        args: Vec<CallArg>,
    ) -> std::result::Result<Reply, RemoteError> {
        self.platform.call(&self.key, method, args).await
    }
}

/// Opens and closes one session per call
#[derive(Clone)]
pub struct SessionManager {
    platform: Arc<dyn RemotePlatform>,
    credentials: Arc<Credentials>,
}

impl SessionManager {
    /// Create a manager over a platform and fixed credentials
    pub fn new(platform: Arc<dyn RemotePlatform>, credentials: Credentials) -> Self {
        Self {
            platform,
            credentials: Arc::new(credentials),
        }
    }

    /// Run `body` inside a freshly opened session.
    ///
    /// The session is released before this returns, whether `body` succeeds
    /// or fails. If the returned future is dropped mid-call, release is
    /// handed to the runtime. When the session cannot be opened, `body` is
    /// not run.
    pub async fn with_session<T, F, Fut>(&self, body: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.credentials.check()?;

        let key = self
            .platform
            .open_session(&self.credentials)
            .await
            .map_err(|e| Error::SessionOpenFailed(e.to_string()))?;
        debug!(endpoint = %key.endpoint(), "Session opened");

        let guard = SessionGuard {
            platform: Arc::clone(&self.platform),
            key: Some(key.clone()),
        };

        let outcome = body(Session {
            platform: Arc::clone(&self.platform),
            key,
        })
        .await;

        guard.release().await;
        outcome
    }
}

/// Releases the session exactly once, even if the owning future is dropped
struct SessionGuard {
    platform: Arc<dyn RemotePlatform>,
    key: Option<SessionKey>,
}

impl SessionGuard {
    async fn release(mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        // Run the close as its own task so dropping this future cannot abandon it
        let platform = Arc::clone(&self.platform);
        let close = tokio::spawn(async move {
            close_session(platform.as_ref(), &key).await;
        });
        if let Err(e) = close.await {
            warn!(error = %e, "Session close task failed");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let platform = Arc::clone(&self.platform);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Call cancelled, releasing session in background");
                handle.spawn(async move {
                    close_session(platform.as_ref(), &key).await;
                });
            }
            Err(_) => warn!(
                endpoint = %key.endpoint(),
                "No runtime to release cancelled session; it will expire remotely"
            ),
        }
    }
}

async fn close_session(platform: &dyn RemotePlatform, key: &SessionKey) {
    match platform.close_session(key).await {
        Ok(()) => debug!(endpoint = %key.endpoint(), "Session closed"),
        Err(e) => warn!(endpoint = %key.endpoint(), error = %e, "Failed to close session"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counting {
        opens: AtomicUsize,
        closes: AtomicUsize,
        reject: bool,
        fail_close: bool,
        close_delay: Option<Duration>,
    }

    #[async_trait]
    impl RemotePlatform for Counting {
        async fn open_session(
            &self,
            credentials: &Credentials,
        ) -> std::result::Result<SessionKey, RemoteError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(RemoteError::Rejected("Invalid user name or password".into()));
            }
            Ok(SessionKey::new(&credentials.url, "k"))
        }

        async fn call(
            &self,
            _session: &SessionKey,
            _method: &str,
            _args: Vec<CallArg>,
        ) -> std::result::Result<Reply, RemoteError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Reply::Json(json!(null)))
        }

        async fn close_session(
            &self,
            _session: &SessionKey,
        ) -> std::result::Result<(), RemoteError> {
            if let Some(delay) = self.close_delay {
                tokio::time::sleep(delay).await;
            }
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(RemoteError::Malformed("close failed".into()))
            } else {
                Ok(())
            }
        }
    }

    fn creds() -> Credentials {
        Credentials {
            url: "http://survey.example/remotecontrol".into(),
            username: "admin".into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", creds());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));

        let rendered = format!("{:?}", SessionKey::new("http://x", "abc123"));
        assert!(!rendered.contains("abc123"));
    }

    #[test]
    fn missing_lists_empty_fields() {
        let credentials = Credentials {
            url: "http://x".into(),
            ..Default::default()
        };
        assert_eq!(credentials.missing(), vec!["username", "password"]);
        assert!(creds().missing().is_empty());
    }

    #[tokio::test]
    async fn success_closes_once() {
        let platform = Arc::new(Counting::default());
        let manager = SessionManager::new(platform.clone(), creds());

        let value = manager.with_session(|_| async { Ok(5) }).await.unwrap();

        assert_eq!(value, 5);
        assert_eq!(platform.opens.load(Ordering::SeqCst), 1);
        assert_eq!(platform.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_body_still_closes() {
        let platform = Arc::new(Counting::default());
        let manager = SessionManager::new(platform.clone(), creds());

        let err = manager
            .with_session(|_| async { Err::<(), _>(Error::Internal("boom".into())) })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(platform.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_failure_does_not_mask_result() {
        let platform = Arc::new(Counting {
            fail_close: true,
            ..Default::default()
        });
        let manager = SessionManager::new(platform.clone(), creds());

        let value = manager.with_session(|_| async { Ok("done") }).await.unwrap();

        assert_eq!(value, "done");
        assert_eq!(platform.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_open_skips_body_and_close() {
        let platform = Arc::new(Counting {
            reject: true,
            ..Default::default()
        });
        let manager = SessionManager::new(platform.clone(), creds());
        let runs = AtomicUsize::new(0);
        let ran = &runs;

        let err = manager
            .with_session(move |_| async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SessionOpenFailed(ref m) if m.contains("Invalid user name")));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(platform.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_credentials_never_reach_platform() {
        let platform = Arc::new(Counting::default());
        let manager = SessionManager::new(platform.clone(), Credentials::default());

        let err = manager.with_session(|_| async { Ok(()) }).await.unwrap_err();

        assert!(matches!(err, Error::SessionOpenFailed(ref m) if m.contains("url")));
        assert_eq!(platform.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_closes_in_background() {
        let platform = Arc::new(Counting::default());
        let manager = SessionManager::new(platform.clone(), creds());

        let call = manager.with_session(|session| async move {
            session
                .call("list_surveys", vec![])
                .await
                .map_err(|e| Error::Internal(e.to_string()))
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(50), call).await;
        assert!(timed_out.is_err());

        for _ in 0..50 {
            if platform.closes.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(platform.opens.load(Ordering::SeqCst), 1);
        assert_eq!(platform.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_during_close_still_finishes_close() {
        let platform = Arc::new(Counting {
            close_delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let manager = SessionManager::new(platform.clone(), creds());

        let timed_out = tokio::time::timeout(
            Duration::from_millis(30),
            manager.with_session(|_| async { Ok(()) }),
        )
        .await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(platform.opens.load(Ordering::SeqCst), 1);
        assert_eq!(platform.closes.load(Ordering::SeqCst), 1);
    }
}
