//! MCP request handler
//!
//! Maps MCP methods onto the dispatcher. Pure building blocks live in
//! [`super::helpers`]; this module only sequences them.

use std::future::Future;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;
use crate::error::rpc_codes;
use crate::fault;
use crate::protocol::{
    JsonRpcResponse, RequestId, ResourcesListResult, ResourcesReadResult,
    ResourcesTemplatesListResult, ToolsListResult, negotiate_version,
};
use crate::remote::RemoteError;
use crate::{Error, Result};

use super::helpers::{
    build_initialize_result, build_resource, build_resource_template, build_tool, error_response,
    extract_client_version, extract_resource_uri, extract_tools_call_params, parse_request,
    to_success, tool_failure_response, wrap_resource_contents, wrap_tool_success,
};

/// Answers MCP JSON-RPC messages
#[derive(Clone)]
pub struct McpHandler {
    dispatcher: Dispatcher,
    request_timeout: Duration,
}

impl McpHandler {
    /// Create a handler bounding every dispatched call by `request_timeout`
    pub fn new(dispatcher: Dispatcher, request_timeout: Duration) -> Self {
        Self {
            dispatcher,
            request_timeout,
        }
    }

    /// Handle one inbound message.
    ///
    /// Returns `None` for notifications, which never get a reply.
    pub async fn handle(&self, message: Value) -> Option<JsonRpcResponse> {
        let (id, method, params) = match parse_request(&message) {
            Ok(parsed) => parsed,
            Err(response) => return Some(response),
        };

        let Some(id) = id else {
            debug!(notification = %method, "Handling notification");
            return None;
        };

        debug!(method = %method, id = %id, "Handling request");
        let response = match method.as_str() {
            "initialize" => Self::handle_initialize(id, params.as_ref()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, params.as_ref()).await,
            "resources/list" => self.handle_resources_list(id),
            "resources/templates/list" => self.handle_resource_templates_list(id),
            "resources/read" => self.handle_resources_read(id, params.as_ref()).await,
            _ => JsonRpcResponse::error(
                Some(id),
                rpc_codes::METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            ),
        };
        Some(response)
    }

    fn handle_initialize(id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let client_version = extract_client_version(params);
        let negotiated_version = negotiate_version(client_version);
        debug!(
            client = client_version,
            negotiated = negotiated_version,
            "Protocol version negotiation"
        );
        to_success(id, &build_initialize_result(negotiated_version))
    }

    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.dispatcher.registry().tools().map(build_tool).collect(),
            next_cursor: None,
        };
        to_success(id, &result)
    }

    fn handle_resources_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ResourcesListResult {
            resources: self
                .dispatcher
                .registry()
                .resources()
                .map(build_resource)
                .collect(),
            next_cursor: None,
        };
        to_success(id, &result)
    }

    fn handle_resource_templates_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ResourcesTemplatesListResult {
            resource_templates: self
                .dispatcher
                .registry()
                .resource_templates()
                .map(build_resource_template)
                .collect(),
            next_cursor: None,
        };
        to_success(id, &result)
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let (name, arguments) = match extract_tools_call_params(params) {
            Ok(parsed) => parsed,
            Err(e) => return tool_failure_response(id, &e),
        };

        match self
            .bounded(self.dispatcher.call_tool(name, arguments))
            .await
        {
            Ok(value) => wrap_tool_success(id, &value),
            Err(e) => {
                debug!(tool = name, error = %e, "Tool call failed");
                tool_failure_response(id, &e)
            }
        }
    }

    async fn handle_resources_read(&self, id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let uri = match extract_resource_uri(params) {
            Ok(uri) => uri,
            Err(e) => return error_response(Some(id), &e),
        };

        match self.bounded(self.dispatcher.read_resource(&uri)).await {
            Ok(value) => to_success(
                id,
                &ResourcesReadResult {
                    contents: vec![wrap_resource_contents(&uri, &value)],
                },
            ),
            Err(e) => {
                debug!(uri = %uri, error = %e, "Resource read failed");
                error_response(Some(id), &e)
            }
        }
    }

    /// Run a dispatch under the request timeout.
    ///
    /// Dropping the dispatch on elapse cancels it; its session is still
    /// released in the background.
    async fn bounded<F>(&self, call: F) -> Result<Value>
    where
        F: Future<Output = Result<Value>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.request_timeout, "Request timed out");
                Err(Error::Remote(fault::translate(RemoteError::Timeout(
                    self.request_timeout,
                ))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use crate::registry::Registry;
    use crate::remote::{CallArg, RemotePlatform, Reply};
    use crate::session::{Credentials, SessionKey, SessionManager};

    /// Echoes the method name back, or sleeps forever for `get_summary`
    #[derive(Default)]
    struct EchoPlatform {
        closed: AtomicUsize,
    }

    #[async_trait]
    impl RemotePlatform for EchoPlatform {
        async fn open_session(
            &self,
            credentials: &Credentials,
        ) -> std::result::Result<SessionKey, RemoteError> {
            Ok(SessionKey::new(credentials.url.clone(), "k"))
        }

        async fn call(
            &self,
            _key: &SessionKey,
            method: &str,
            _args: Vec<CallArg>,
        ) -> std::result::Result<Reply, RemoteError> {
            if method == "get_summary" {
                std::future::pending::<()>().await;
            }
            Ok(Reply::Json(json!({ "method": method })))
        }

        async fn close_session(&self, _key: &SessionKey) -> std::result::Result<(), RemoteError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn handler(platform: Arc<EchoPlatform>, timeout: Duration) -> McpHandler {
        let credentials = Credentials {
            url: "http://survey.test/index.php/admin/remotecontrol".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
        };
        let dispatcher = Dispatcher::new(
            Registry::builtin(),
            SessionManager::new(platform, credentials),
        );
        McpHandler::new(dispatcher, timeout)
    }

    fn request(method: &str, params: Value) -> Value {
        json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params})
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let handler = handler(Arc::default(), Duration::from_secs(5));
        let reply = handler
            .handle(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let handler = handler(Arc::default(), Duration::from_secs(5));
        let reply = handler.handle(request("prompts/list", json!({}))).await.unwrap();
        assert_eq!(reply.error.unwrap().code, rpc_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn initialize_negotiates_version() {
        let handler = handler(Arc::default(), Duration::from_secs(5));
        let reply = handler
            .handle(request("initialize", json!({"protocolVersion": "2024-11-05"})))
            .await
            .unwrap();
        assert_eq!(reply.result.unwrap()["protocolVersion"], "2024-11-05");
    }

    #[tokio::test]
    async fn listings_split_resources_templates_and_tools() {
        let handler = handler(Arc::default(), Duration::from_secs(5));

        let tools = handler.handle(request("tools/list", json!({}))).await.unwrap();
        let tools = tools.result.unwrap();
        assert_eq!(tools["tools"].as_array().unwrap().len(), 34);

        let resources = handler
            .handle(request("resources/list", json!({})))
            .await
            .unwrap()
            .result
            .unwrap();
        let templates = handler
            .handle(request("resources/templates/list", json!({})))
            .await
            .unwrap()
            .result
            .unwrap();
        let concrete = resources["resources"].as_array().unwrap().len();
        let templated = templates["resourceTemplates"].as_array().unwrap().len();
        assert_eq!(concrete + templated, 22);
        assert!(
            resources["resources"]
                .as_array()
                .unwrap()
                .iter()
                .any(|r| r["uri"] == "survey://")
        );
    }

    #[tokio::test]
    async fn resources_read_wraps_contents() {
        let handler = handler(Arc::default(), Duration::from_secs(5));
        let reply = handler
            .handle(request("resources/read", json!({"uri": "survey://7"})))
            .await
            .unwrap();
        let result = reply.result.unwrap();
        assert_eq!(result["contents"][0]["uri"], "survey://7");
        assert_eq!(result["contents"][0]["mimeType"], "application/json");
        assert!(
            result["contents"][0]["text"]
                .as_str()
                .unwrap()
                .contains("get_survey_properties")
        );
    }

    #[tokio::test]
    async fn tool_names_are_not_readable_resources() {
        let handler = handler(Arc::default(), Duration::from_secs(5));
        let reply = handler
            .handle(request("resources/read", json!({"uri": "delete_survey"})))
            .await
            .unwrap();
        assert_eq!(reply.error.unwrap().code, rpc_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_call_reports_invalid_arguments() {
        let handler = handler(Arc::default(), Duration::from_secs(5));
        let reply = handler
            .handle(request("tools/call", json!({"name": "add_group", "arguments": {}})))
            .await
            .unwrap();
        assert!(reply.error.is_none());
        let result = reply.result.unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        let report: Value = serde_json::from_str(text).unwrap();
        assert_eq!(report["kind"], "invalid_argument");
        assert_eq!(report["code"], "-32602");
    }

    #[tokio::test]
    async fn unknown_tool_is_method_not_found() {
        let handler = handler(Arc::default(), Duration::from_secs(5));
        let reply = handler
            .handle(request("tools/call", json!({"name": "survey://", "arguments": {}})))
            .await
            .unwrap();
        assert_eq!(reply.error.unwrap().code, rpc_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_call_without_name_is_invalid_request() {
        let handler = handler(Arc::default(), Duration::from_secs(5));
        let reply = handler
            .handle(request("tools/call", json!({"arguments": {}})))
            .await
            .unwrap();
        assert_eq!(reply.error.unwrap().code, rpc_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn timeout_is_a_transport_fault_and_still_closes() {
        let platform = Arc::new(EchoPlatform::default());
        let handler = handler(Arc::clone(&platform), Duration::from_millis(50));
        let reply = handler
            .handle(request("resources/read", json!({"uri": "summary://7"})))
            .await
            .unwrap();

        let error = reply.error.unwrap();
        assert_eq!(error.code, rpc_codes::REMOTE_FAULT);
        assert_eq!(error.data.unwrap()["code"], "transport");

        for _ in 0..50 {
            if platform.closed.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session was not closed after timeout");
    }
}
