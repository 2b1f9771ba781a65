//! Shared test fixtures: a scripted in-memory remote platform

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use limesurvey_mcp::dispatch::Dispatcher;
use limesurvey_mcp::gateway::McpHandler;
use limesurvey_mcp::registry::Registry;
use limesurvey_mcp::remote::{CallArg, RemoteError, RemotePlatform, Reply};
use limesurvey_mcp::session::{Credentials, SessionKey, SessionManager};

type Script = Box<dyn Fn(&str, &[CallArg]) -> Result<Reply, RemoteError> + Send + Sync>;

/// Remote platform answering from a script and counting every interaction
pub struct StubPlatform {
    script: Script,
    refuse_open: bool,
    hang_on: Option<&'static str>,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub calls: Mutex<Vec<(String, Vec<CallArg>)>>,
}

impl StubPlatform {
    /// Stub that answers every call with `script`
    pub fn new(
        script: impl Fn(&str, &[CallArg]) -> Result<Reply, RemoteError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            refuse_open: false,
            hang_on: None,
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Stub that answers every call with the same JSON value
    pub fn replying(value: Value) -> Self {
        Self::new(move |_, _| Ok(Reply::Json(value.clone())))
    }

    /// Refuse to open sessions
    #[must_use]
    pub fn refusing(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    /// Never answer calls to `method`
    #[must_use]
    pub fn hanging_on(mut self, method: &'static str) -> Self {
        self.hang_on = Some(method);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Method names and arguments of every call so far
    pub fn recorded(&self) -> Vec<(String, Vec<CallArg>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until `closes` reaches `expected`, for background releases
    pub async fn wait_for_closes(&self, expected: usize) -> bool {
        for _ in 0..100 {
            if self.close_count() == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

#[async_trait]
impl RemotePlatform for StubPlatform {
    async fn open_session(&self, credentials: &Credentials) -> Result<SessionKey, RemoteError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.refuse_open {
            return Err(RemoteError::Rejected("Invalid user name or password".to_string()));
        }
        Ok(SessionKey::new(credentials.url.clone(), "stub-session-key"))
    }

    async fn call(
        &self,
        key: &SessionKey,
        method: &str,
        args: Vec<CallArg>,
    ) -> Result<Reply, RemoteError> {
        assert_eq!(key.key(), "stub-session-key");
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), args.clone()));
        if self.hang_on == Some(method) {
            std::future::pending::<()>().await;
        }
        (self.script)(method, &args)
    }

    async fn close_session(&self, _key: &SessionKey) -> Result<(), RemoteError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        url: "http://survey.test/index.php/admin/remotecontrol".to_string(),
        username: "admin".to_string(),
        password: "secret".to_string(),
    }
}

pub fn dispatcher(platform: Arc<StubPlatform>) -> Dispatcher {
    Dispatcher::new(
        Registry::builtin(),
        SessionManager::new(platform, credentials()),
    )
}

pub fn handler(platform: Arc<StubPlatform>) -> McpHandler {
    McpHandler::new(dispatcher(platform), Duration::from_secs(5))
}
